//! Product and history projection storage
use super::error::StoreError;
use super::product::{HistoryRecord, Product, Role, User};
use sled::Batch;
use std::sync::Arc;

const PRODUCT_PREFIX: &str = "product/";
const USER_PREFIX: &str = "user/";
const HISTORY_PREFIX: &str = "history/";

/// Mutable current-state view of products and users.
///
/// `commit_product` and `remove_product` must apply all of their writes or none.
pub trait ProductStore: Send + Sync {
    fn get_product(&self, product_id: &str) -> Result<Option<Product>, StoreError>;
    fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
    fn put_user(&self, user: &User) -> Result<(), StoreError>;
    /// Upsert the product row and append one history record.
    fn commit_product(&self, product: &Product, record: &HistoryRecord) -> Result<(), StoreError>;
    /// Drop the product row together with its whole history.
    fn remove_product(&self, product_id: &str) -> Result<(), StoreError>;
    /// History of a product in insertion order.
    fn query_history(&self, product_id: &str) -> Result<Vec<HistoryRecord>, StoreError>;
}

pub struct SledProductStore {
    instance: Arc<sled::Db>,
}

fn product_key(product_id: &str) -> Vec<u8> {
    format!("{PRODUCT_PREFIX}{product_id}").into_bytes()
}

fn user_key(username: &str) -> Vec<u8> {
    format!("{USER_PREFIX}{username}").into_bytes()
}

fn history_prefix(product_id: &str) -> Vec<u8> {
    format!("{HISTORY_PREFIX}{product_id}/").into_bytes()
}

// the sequence number is big endian so a prefix scan yields insertion order
fn history_key(product_id: &str, sequence: u64) -> Vec<u8> {
    let mut key = history_prefix(product_id);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

impl SledProductStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    fn scan<T>(&self, prefix: &[u8]) -> Result<Vec<T>, StoreError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        self.instance
            .scan_prefix(prefix)
            .values()
            .map(|value| -> Result<T, StoreError> { Ok(minicbor::decode(&value?)?) })
            .collect()
    }
}

impl ProductStore for SledProductStore {
    fn get_product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        match self.instance.get(product_key(product_id))? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.scan(PRODUCT_PREFIX.as_bytes())
    }

    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        match self.instance.get(user_key(username))? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.scan(USER_PREFIX.as_bytes())
    }

    fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.instance.insert(user_key(&user.username), encode(user)?)?;
        Ok(())
    }

    fn commit_product(&self, product: &Product, record: &HistoryRecord) -> Result<(), StoreError> {
        let sequence = self.instance.generate_id()?;

        let mut batch = Batch::default();
        batch.insert(product_key(&product.product_id), encode(product)?);
        batch.insert(history_key(&record.product_id, sequence), encode(record)?);
        self.instance.apply_batch(batch)?;

        Ok(())
    }

    fn remove_product(&self, product_id: &str) -> Result<(), StoreError> {
        let mut batch = Batch::default();
        for key in self.instance.scan_prefix(history_prefix(product_id)).keys() {
            batch.remove(key?);
        }
        batch.remove(product_key(product_id));
        self.instance.apply_batch(batch)?;

        Ok(())
    }

    fn query_history(&self, product_id: &str) -> Result<Vec<HistoryRecord>, StoreError> {
        self.scan(&history_prefix(product_id))
    }
}

/// Users holding `role`, as listed by the store.
pub fn users_with_role(store: &dyn ProductStore, role: Role) -> Result<Vec<User>, StoreError> {
    Ok(store
        .list_users()?
        .into_iter()
        .filter(|user| user.role == role)
        .collect())
}
