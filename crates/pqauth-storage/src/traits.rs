//! Storage trait definitions.

use crate::errors::{Result, StorageError};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Keyed store collaborator
///
/// Keys and values are `bincode`-encoded. Every single-key operation is atomic with respect to
/// concurrent operations on the same key; [`Storage::compare_and_swap`] and
/// [`Storage::put_if_absent`] give callers linearizable read-modify-write.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Get a value by key from a column family
    ///
    /// # Returns
    ///
    /// `Ok(Some(value))` if key exists, `Ok(None)` if not found
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    /// Put a key-value pair into a column family
    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Delete a key from a column family
    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync;

    /// Replace the value at `key` only if it currently equals `expected`.
    ///
    /// `None` as `expected` means "absent"; `None` as `new` deletes. Returns whether the swap
    /// happened. Values are compared by their encoding.
    async fn compare_and_swap<K, V>(
        &self,
        cf: &str,
        key: &K,
        expected: Option<&V>,
        new: Option<&V>,
    ) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    /// Insert only if `key` is absent; returns whether the value was written.
    async fn put_if_absent<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<bool>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        self.compare_and_swap(cf, key, None, Some(value)).await
    }

    /// All entries whose encoded key starts with the encoding of `prefix`
    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    /// Every entry of a column family, in key order
    async fn scan<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned;

    /// Create a new batch for atomic operations
    fn batch(&self) -> Box<dyn Batch>;
}

/// Batch interface for atomic operations
///
/// Batches work with pre-serialized bytes to stay object safe; [`BatchExt`] adds typed helpers.
/// Batches only need to be `Send` since they live inside one task.
#[async_trait]
pub trait Batch: Send {
    /// Put a pre-serialized key-value pair in the batch
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    /// Delete a pre-serialized key in the batch
    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()>;

    /// Commit the batch atomically; dropping an uncommitted batch discards it
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Type-safe helpers for [`Batch`]
pub trait BatchExt: Batch {
    /// Put a key-value pair in the batch (type-safe)
    fn put<K, V>(&mut self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        let key_bytes = serialize_key(key)?;
        let value_bytes = serialize_value(value)?;
        self.put_raw(cf, key_bytes, value_bytes)
    }

    /// Delete a key in the batch (type-safe)
    fn delete<K>(&mut self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize,
    {
        let key_bytes = serialize_key(key)?;
        self.delete_raw(cf, key_bytes)
    }
}

impl<T: Batch + ?Sized> BatchExt for T {}

/// Encode a key
pub fn serialize_key<K: Serialize + ?Sized>(key: &K) -> Result<Vec<u8>> {
    bincode::serialize(key).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Encode a value
pub fn serialize_value<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Decode a value
pub fn deserialize_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Deserialization(e.to_string()))
}
