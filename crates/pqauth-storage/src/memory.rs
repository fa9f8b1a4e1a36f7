//! In-memory storage backend.

use crate::{
    column_families::all_column_families,
    errors::{Result, StorageError},
    traits::{deserialize_value, serialize_key, serialize_value, Batch, Storage},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

type ColumnFamily = BTreeMap<Vec<u8>, Vec<u8>>;
type Families = HashMap<&'static str, ColumnFamily>;

/// Storage kept in process memory, one ordered map per column family
#[derive(Clone)]
pub struct MemoryStorage {
    families: Arc<RwLock<Families>>,
}

impl MemoryStorage {
    /// Create an empty store with every known column family
    pub fn new() -> Self {
        let families = all_column_families()
            .into_iter()
            .map(|cf| (cf, ColumnFamily::new()))
            .collect();
        Self {
            families: Arc::new(RwLock::new(families)),
        }
    }

    /// Number of entries in a column family
    pub async fn len(&self, cf: &str) -> Result<usize> {
        let families = self.families.read().await;
        Ok(family(&families, cf)?.len())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn family<'a>(families: &'a Families, cf: &str) -> Result<&'a ColumnFamily> {
    families
        .get(cf)
        .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
}

fn family_mut<'a>(families: &'a mut Families, cf: &str) -> Result<&'a mut ColumnFamily> {
    families
        .get_mut(cf)
        .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let key_bytes = serialize_key(key)?;
        let families = self.families.read().await;
        family(&families, cf)?
            .get(&key_bytes)
            .map(|bytes| deserialize_value(bytes))
            .transpose()
    }

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let value_bytes = serialize_value(value)?;
        let mut families = self.families.write().await;
        family_mut(&mut families, cf)?.insert(key_bytes, value_bytes);
        Ok(())
    }

    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let mut families = self.families.write().await;
        family_mut(&mut families, cf)?.remove(&key_bytes);
        Ok(())
    }

    async fn compare_and_swap<K, V>(
        &self,
        cf: &str,
        key: &K,
        expected: Option<&V>,
        new: Option<&V>,
    ) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        let key_bytes = serialize_key(key)?;
        let expected_bytes = expected.map(serialize_value).transpose()?;
        let new_bytes = new.map(serialize_value).transpose()?;

        let mut families = self.families.write().await;
        let entries = family_mut(&mut families, cf)?;
        if entries.get(&key_bytes) != expected_bytes.as_ref() {
            return Ok(false);
        }
        match new_bytes {
            Some(bytes) => entries.insert(key_bytes, bytes),
            None => entries.remove(&key_bytes),
        };
        Ok(true)
    }

    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let prefix_bytes = serialize_key(prefix)?;
        let families = self.families.read().await;
        family(&families, cf)?
            .range(prefix_bytes.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix_bytes))
            .map(|(key, value)| Ok((key.clone(), deserialize_value(value)?)))
            .collect()
    }

    async fn scan<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        let families = self.families.read().await;
        family(&families, cf)?
            .iter()
            .map(|(key, value)| Ok((key.clone(), deserialize_value(value)?)))
            .collect()
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(MemoryBatch {
            families: Arc::clone(&self.families),
            ops: Vec::new(),
        })
    }
}

enum BatchOp {
    Put(&'static str, Vec<u8>, Vec<u8>),
    Delete(&'static str, Vec<u8>),
}

/// Batch applied under a single write lock
pub struct MemoryBatch {
    families: Arc<RwLock<Families>>,
    ops: Vec<BatchOp>,
}

fn known_family(cf: &str) -> Result<&'static str> {
    all_column_families()
        .into_iter()
        .find(|name| *name == cf)
        .ok_or_else(|| StorageError::InvalidColumnFamily(cf.to_string()))
}

#[async_trait]
impl Batch for MemoryBatch {
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ops.push(BatchOp::Put(known_family(cf)?, key, value));
        Ok(())
    }

    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()> {
        self.ops.push(BatchOp::Delete(known_family(cf)?, key));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryBatch { families, ops } = *self;
        let count = ops.len();
        let mut families = families.write().await;
        for op in ops {
            match op {
                BatchOp::Put(cf, key, value) => {
                    family_mut(&mut families, cf)?.insert(key, value);
                }
                BatchOp::Delete(cf, key) => {
                    family_mut(&mut families, cf)?.remove(&key);
                }
            }
        }
        debug!(operations = count, "Batch committed");
        Ok(())
    }
}
