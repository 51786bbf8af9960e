//! Ledger blocks and the event payloads they carry
use super::error::LedgerError;
use super::product::{Status, TimeStamp};
use chrono::Utc;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, PartialEq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum BlockData {
    #[n(0)]
    Genesis,
    #[n(1)]
    CreateProduct {
        #[n(0)]
        product_id: String,
        #[n(1)]
        owner: String,
        #[n(2)]
        initial_custodian: String,
        #[n(3)]
        location: String, // "lat,lon" or "N/A"
    },
    #[n(2)]
    CustodyTransfer {
        #[n(0)]
        product_id: String,
        #[n(1)]
        status: Status,
        #[n(2)]
        actor: String,
        #[n(3)]
        new_custodian: String,
        #[n(4)]
        location: String,
    },
    #[n(3)]
    StatusUpdate {
        #[n(0)]
        product_id: String,
        #[n(1)]
        status: Status,
        #[n(2)]
        actor: String,
        #[n(3)]
        new_custodian: String,
        #[n(4)]
        location: String,
    },
    #[n(4)]
    DeleteProduct {
        #[n(0)]
        product_id: String,
        #[n(1)]
        deleted_by: String,
    },
}

#[derive(Debug, PartialEq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Block {
    #[n(0)]
    pub index: u64,
    #[n(1)]
    pub timestamp: TimeStamp<Utc>,
    #[n(2)]
    pub data: BlockData,
    #[n(3)]
    pub previous_hash: String,
    #[n(4)]
    pub hash: String, // sha256 of the header fields, hex
}

// The hashed portion of a block, everything except the hash itself.
#[derive(minicbor::Encode)]
struct BlockHeader<'a> {
    #[n(0)]
    index: u64,
    #[n(1)]
    timestamp: &'a TimeStamp<Utc>,
    #[n(2)]
    data: &'a BlockData,
    #[n(3)]
    previous_hash: &'a str,
}

impl BlockData {
    /// Type tag of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            BlockData::Genesis => "genesis",
            BlockData::CreateProduct { .. } => "create_product",
            BlockData::CustodyTransfer { .. } => "custody_transfer",
            BlockData::StatusUpdate { .. } => "status_update",
            BlockData::DeleteProduct { .. } => "delete_product",
        }
    }

    pub fn product_id(&self) -> Option<&str> {
        match self {
            BlockData::Genesis => None,
            BlockData::CreateProduct { product_id, .. }
            | BlockData::CustodyTransfer { product_id, .. }
            | BlockData::StatusUpdate { product_id, .. }
            | BlockData::DeleteProduct { product_id, .. } => Some(product_id),
        }
    }

    /// Status the event moved the product into, if it was a transition.
    pub fn status(&self) -> Option<Status> {
        match self {
            BlockData::CreateProduct { .. } => Some(Status::Created),
            BlockData::CustodyTransfer { status, .. } | BlockData::StatusUpdate { status, .. } => {
                Some(*status)
            }
            BlockData::Genesis | BlockData::DeleteProduct { .. } => None,
        }
    }

    /// Custodian holding the product once the event was applied.
    pub fn custodian(&self) -> Option<&str> {
        match self {
            BlockData::CreateProduct {
                initial_custodian, ..
            } => Some(initial_custodian),
            BlockData::CustodyTransfer { new_custodian, .. }
            | BlockData::StatusUpdate { new_custodian, .. } => Some(new_custodian),
            BlockData::Genesis | BlockData::DeleteProduct { .. } => None,
        }
    }
}

impl Block {
    pub fn new(
        index: u64,
        timestamp: TimeStamp<Utc>,
        data: BlockData,
        previous_hash: String,
    ) -> Result<Self, LedgerError> {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.calculate_hash()?;

        Ok(block)
    }

    pub fn genesis() -> Result<Self, LedgerError> {
        Self::new(
            0,
            TimeStamp::new(),
            BlockData::Genesis,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Recompute the digest from the stored fields. The header is encoded into cbor
    /// then hashed, so the same fields always produce the same hash.
    pub fn calculate_hash(&self) -> Result<String, LedgerError> {
        let header = BlockHeader {
            index: self.index,
            timestamp: &self.timestamp,
            data: &self.data,
            previous_hash: &self.previous_hash,
        };
        let cbor = minicbor::to_vec(&header).map_err(|e| LedgerError::Encode(e.to_string()))?;

        Ok(sha256::digest(&cbor))
    }

    pub fn is_hash_valid(&self) -> bool {
        matches!(self.calculate_hash(), Ok(hash) if hash == self.hash)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, LedgerError> {
        minicbor::to_vec(self).map_err(|e| LedgerError::Encode(e.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(minicbor::decode(bytes)?)
    }
}
