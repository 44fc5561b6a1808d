//! Ordered keyed storage for treasury state
//!
//! State is grouped into named keyspaces. Keys inside a keyspace iterate in
//! ascending byte order, so callers that need a deterministic ordering
//! (e.g. time-keyed queues) encode it in the key. Writes go through a
//! [`WriteBatch`] which a backend applies atomically: either every operation
//! in the batch lands or none does.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupted storage: {0}")]
    Corrupted(String),
    #[error("Invalid keyspace: {0}")]
    InvalidKeyspace(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put {
        keyspace: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        keyspace: &'static str,
        key: Vec<u8>,
    },
}

/// Ordered list of mutations applied atomically by [`Store::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, keyspace: &'static str, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Put {
            keyspace,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Serialize `value` as JSON and stage it under `key`.
    pub fn put_json<T: serde::Serialize>(
        &mut self,
        keyspace: &'static str,
        key: impl Into<Vec<u8>>,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(keyspace, key, bytes);
        Ok(())
    }

    pub fn delete(&mut self, keyspace: &'static str, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete {
            keyspace,
            key: key.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// Abstract storage trait
pub trait Store: Send + Sync {
    /// Read a single value.
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All `(key, value)` pairs of a keyspace in ascending key order.
    fn scan(&self, keyspace: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply every operation of `batch` atomically, in order.
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Read and decode a JSON value.
    fn get_json<T: serde::de::DeserializeOwned>(&self, keyspace: &str, key: &[u8]) -> Result<Option<T>>
    where
        Self: Sized,
    {
        self.get(keyspace, key)?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }
}

/// Longest keyspace name, bounded by its one-byte length prefix.
pub const MAX_KEYSPACE_LEN: usize = u8::MAX as usize;

/// Physical key: `[len(keyspace)] ‖ keyspace ‖ key`. The length prefix keeps
/// one keyspace from being a prefix of another.
fn physical_key(keyspace: &str, key: &[u8]) -> Result<Vec<u8>> {
    let mut out = keyspace_prefix(keyspace)?;
    out.extend_from_slice(key);
    Ok(out)
}

fn keyspace_prefix(keyspace: &str) -> Result<Vec<u8>> {
    let len = u8::try_from(keyspace.len()).map_err(|_| {
        StorageError::InvalidKeyspace(format!(
            "{} bytes, at most {} allowed",
            keyspace.len(),
            MAX_KEYSPACE_LEN
        ))
    })?;
    let mut out = Vec::with_capacity(1 + keyspace.len());
    out.push(len);
    out.extend_from_slice(keyspace.as_bytes());
    Ok(out)
}

/// Sled-backed implementation
///
/// All keyspaces share one tree so a batch spanning keyspaces is applied
/// with a single `apply_batch`.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree("treasury")?;
        Ok(Self { db, tree })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Store for SledStore {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tree
            .get(physical_key(keyspace, key)?)?
            .map(|v| v.to_vec()))
    }

    fn scan(&self, keyspace: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = keyspace_prefix(keyspace)?;
        self.tree
            .scan_prefix(&prefix)
            .map(|entry| {
                let (k, v) = entry?;
                Ok((k[prefix.len()..].to_vec(), v.to_vec()))
            })
            .collect()
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch.ops {
            match op {
                WriteOp::Put {
                    keyspace,
                    key,
                    value,
                } => sled_batch.insert(physical_key(keyspace, &key)?, value),
                WriteOp::Delete { keyspace, key } => {
                    sled_batch.remove(physical_key(keyspace, &key)?)
                }
            }
        }
        self.tree.apply_batch(sled_batch)?;
        Ok(())
    }
}

/// In-memory implementation (for node runtime or testing)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries across keyspaces.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, keyspace: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = physical_key(keyspace, key)?;
        Ok(self.entries.read().get(&key).cloned())
    }

    fn scan(&self, keyspace: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = keyspace_prefix(keyspace)?;
        Ok(self
            .entries
            .read()
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k[prefix.len()..].to_vec(), v.clone()))
            .collect())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        // Resolve every key before touching the map so a bad op applies nothing.
        let resolved = batch
            .ops
            .into_iter()
            .map(|op| match op {
                WriteOp::Put {
                    keyspace,
                    key,
                    value,
                } => Ok((physical_key(keyspace, &key)?, Some(value))),
                WriteOp::Delete { keyspace, key } => Ok((physical_key(keyspace, &key)?, None)),
            })
            .collect::<Result<Vec<_>>>()?;

        // Holding the write lock for the whole batch makes it atomic for readers.
        let mut entries = self.entries.write();
        for (key, value) in resolved {
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyspaces_do_not_bleed() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put("ab", b"c".to_vec(), b"1".to_vec());
        batch.put("a", b"bc".to_vec(), b"2".to_vec());
        store.write(batch).unwrap();

        assert_eq!(store.scan("ab").unwrap(), vec![(b"c".to_vec(), b"1".to_vec())]);
        assert_eq!(store.scan("a").unwrap(), vec![(b"bc".to_vec(), b"2".to_vec())]);
        assert!(store.scan("abc").unwrap().is_empty());
    }

    #[test]
    fn test_scan_is_ordered() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for k in [3u64, 1, 256, 2] {
            batch.put("queue", k.to_be_bytes().to_vec(), Vec::new());
        }
        store.write(batch).unwrap();

        let keys: Vec<u64> = store
            .scan("queue")
            .unwrap()
            .into_iter()
            .map(|(k, _)| u64::from_be_bytes(k.try_into().unwrap()))
            .collect();
        assert_eq!(keys, vec![1, 2, 3, 256]);
    }

    #[test]
    fn test_batch_put_then_delete() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put("globals", b"k".to_vec(), b"v".to_vec());
        batch.delete("globals", b"k".to_vec());
        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.ops()[1], WriteOp::Delete { keyspace: "globals", .. }));
        store.write(batch).unwrap();
        assert_eq!(store.get("globals", b"k").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_json("globals", b"height".to_vec(), &42u64).unwrap();
        store.write(batch).unwrap();
        let height: Option<u64> = store.get_json("globals", b"height").unwrap();
        assert_eq!(height, Some(42));
    }

    #[test]
    fn test_oversized_keyspace_is_rejected() {
        let long: &'static str = Box::leak("k".repeat(MAX_KEYSPACE_LEN + 1).into_boxed_str());
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put("globals", b"a".to_vec(), b"1".to_vec());
        batch.put(long, b"b".to_vec(), b"2".to_vec());

        assert!(matches!(store.write(batch), Err(StorageError::InvalidKeyspace(_))));
        assert!(store.is_empty());
        assert!(matches!(store.get(long, b"b"), Err(StorageError::InvalidKeyspace(_))));
        assert!(matches!(store.scan(long), Err(StorageError::InvalidKeyspace(_))));

        // the longest allowed name still works and stays distinct
        let max = "k".repeat(MAX_KEYSPACE_LEN);
        assert!(store.scan(&max).unwrap().is_empty());
    }
}
