//! Role and status tables driving the custody state machine
use super::product::{Role, Status};

/// Statuses a role may request. The admin override only bypasses the custodian check,
/// the one stage it may set itself is a recall.
pub fn allowed_statuses(role: Role) -> &'static [Status] {
    match role {
        Role::Manufacturer => &[Status::Created, Status::ReadyForShipping],
        Role::Distributor => &[
            Status::Shipped,
            Status::InTransit,
            Status::DeliveredToRetailer,
        ],
        Role::Retailer => &[Status::AvailableForSale, Status::Sold],
        Role::SuperAdmin => &[Status::Recalled],
    }
}

pub fn can_set_status(role: Role, status: Status) -> bool {
    allowed_statuses(role).contains(&status)
}

/// Role the new custodian must hold when `status` hands the product over.
/// `None` means the status is not a handoff and custody stays put.
pub fn handoff_role(status: Status) -> Option<Role> {
    match status {
        Status::ReadyForShipping => Some(Role::Distributor),
        Status::DeliveredToRetailer => Some(Role::Retailer),
        Status::Created
        | Status::Shipped
        | Status::InTransit
        | Status::AvailableForSale
        | Status::Sold
        | Status::Recalled => None,
    }
}

pub fn is_handoff(status: Status) -> bool {
    handoff_role(status).is_some()
}

/// Exact status a product must be in before `role` may move it to `status`.
///
/// Only distributors are bound to a strict two hop sequence; every other role
/// is constrained by the monotonic stage order alone.
pub fn required_predecessor(role: Role, status: Status) -> Option<Status> {
    if role != Role::Distributor {
        return None;
    }
    match status {
        Status::InTransit => Some(Status::Shipped),
        Status::DeliveredToRetailer => Some(Status::InTransit),
        Status::Created
        | Status::ReadyForShipping
        | Status::Shipped
        | Status::AvailableForSale
        | Status::Sold
        | Status::Recalled => None,
    }
}
