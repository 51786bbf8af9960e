//! Append-only, hash-linked ledger of custody events
use super::block::{Block, BlockData, GENESIS_PREVIOUS_HASH};
use super::error::LedgerError;
use super::product::TimeStamp;
use parking_lot::RwLock;

/// Durable backing for the ledger. A block handed to `persist_block` must be
/// durable before the call returns.
pub trait LedgerStore: Send + Sync {
    /// Every persisted block, ordered by index.
    fn load_blocks(&self) -> Result<Vec<Block>, LedgerError>;
    fn persist_block(&self, block: &Block) -> Result<(), LedgerError>;
}

/// Blocks live in their own sled tree, keyed by the big endian index so that
/// iteration order is chain order.
pub struct SledLedgerStore {
    tree: sled::Tree,
}

/// Outcome of a full chain scan. An invalid chain is a result, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    pub message: String,
}

pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    store: Box<dyn LedgerStore>,
}

impl SledLedgerStore {
    pub const TREE: &'static str = "ledger";

    pub fn open(db: &sled::Db) -> Result<Self, LedgerError> {
        Ok(Self {
            tree: db.open_tree(Self::TREE)?,
        })
    }
}

impl LedgerStore for SledLedgerStore {
    fn load_blocks(&self) -> Result<Vec<Block>, LedgerError> {
        self.tree
            .iter()
            .values()
            .map(|value| Block::from_cbor(&value?))
            .collect()
    }

    fn persist_block(&self, block: &Block) -> Result<(), LedgerError> {
        self.tree
            .insert(block.index.to_be_bytes(), block.to_cbor()?)?;
        self.tree.flush()?;
        Ok(())
    }
}

impl ChainVerification {
    fn valid() -> Self {
        Self {
            valid: true,
            message: "Blockchain is valid".to_string(),
        }
    }

    fn invalid(message: String) -> Self {
        Self {
            valid: false,
            message,
        }
    }
}

/// Walk the chain from genesis and stop at the first block whose stored hash does
/// not match its fields, or whose link does not match its predecessor. Genesis
/// must link to the zero sentinel.
pub fn verify_blocks(blocks: &[Block]) -> ChainVerification {
    if let Some(genesis) = blocks.first() {
        if !genesis.is_hash_valid() {
            return ChainVerification::invalid("Hash mismatch at index 0".to_string());
        }
        if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return ChainVerification::invalid("Previous hash mismatch at index 0".to_string());
        }
    }

    for (position, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = position + 1;

        if !current.is_hash_valid() {
            return ChainVerification::invalid(format!("Hash mismatch at index {index}"));
        }
        if current.previous_hash != previous.hash {
            return ChainVerification::invalid(format!("Previous hash mismatch at index {index}"));
        }
    }

    ChainVerification::valid()
}

impl Ledger {
    /// Load the persisted chain, writing a genesis block first when there is none.
    pub fn open(store: impl LedgerStore + 'static) -> Result<Self, LedgerError> {
        let mut chain = store.load_blocks()?;

        if chain.first().map(|block| block.index) != Some(0) {
            let genesis = Block::genesis()?;
            store.persist_block(&genesis)?;
            tracing::info!(hash = %genesis.hash, "created genesis block");
            chain.insert(0, genesis);
        } else {
            tracing::info!(blocks = chain.len(), "loaded ledger");
        }

        Ok(Self {
            chain: RwLock::new(chain),
            store: Box::new(store),
        })
    }

    /// Append a block for `data` linked to the current tail.
    ///
    /// The write guard is held across building, persisting and pushing, so two
    /// callers can never claim the same index or link to the same tail. Readers see
    /// the block only once it has been persisted.
    pub fn add_block(&self, data: BlockData) -> Result<Block, LedgerError> {
        let mut chain = self.chain.write();

        let previous_hash = chain
            .last()
            .map(|tail| tail.hash.clone())
            .ok_or_else(|| LedgerError::Corrupted("ledger has no genesis block".into()))?;
        let block = Block::new(chain.len() as u64, TimeStamp::new(), data, previous_hash)?;

        self.store.persist_block(&block)?;
        chain.push(block.clone());

        tracing::info!(
            index = block.index,
            kind = block.data.kind(),
            product_id = block.data.product_id().unwrap_or("-"),
            "appended ledger block"
        );

        Ok(block)
    }

    /// Snapshot of the whole chain.
    pub fn chain(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    pub fn last_block(&self) -> Option<Block> {
        self.chain.read().last().cloned()
    }

    /// Blocks concerning `product_id`, in chain order. Iterates over a snapshot, so
    /// appends made meanwhile are not observed; call again to restart.
    pub fn blocks_for_product(&self, product_id: &str) -> impl Iterator<Item = Block> {
        let product_id = product_id.to_owned();
        self.chain()
            .into_iter()
            .filter(move |block| block.data.product_id() == Some(product_id.as_str()))
    }

    // full scan every call, no cached verification state
    pub fn verify_chain(&self) -> ChainVerification {
        let snapshot = self.chain();
        let result = verify_blocks(&snapshot);

        if !result.valid {
            tracing::warn!(message = %result.message, "ledger verification failed");
        }
        result
    }
}
