use super::product::{Role, Status};

#[derive(thiserror::Error, Debug)]
pub enum CustodyError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: Status, to: Status },
    #[error(
        "Invalid sequence: to set status to '{status}', product must first be in '{required}' status"
    )]
    InvalidSequence { status: Status, required: Status },
    #[error("'transfer_to' is required for status '{status}'")]
    MissingTransferTarget { status: Status },
    #[error("Can only transfer to '{expected}', but '{username}' is a '{actual}'")]
    RoleMismatch {
        expected: Role,
        username: String,
        actual: Role,
    },
    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Authorization failures raised by the custody state machine.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Forbidden {
    #[error("Action failed: you are not the current custodian ('{custodian}')")]
    WrongCustodian { custodian: String },
    #[error("Your role '{role}' cannot set status '{status}'")]
    RoleCannotSetStatus { role: Role, status: Status },
    #[error("Your role '{role}' is not permitted to {action}")]
    RoleNotPermitted { role: Role, action: &'static str },
}

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("failed to encode block: {0}")]
    Encode(String),
    #[error("failed to decode block: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("ledger storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("ledger is corrupted: {0}")]
    Corrupted(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("projection storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
