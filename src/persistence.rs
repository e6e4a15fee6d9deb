//! Append-store persistence contract, spec.md §6.2.
//!
//! The core never assumes any particular storage backend; it is consumed
//! only for restart recovery via [`PersistenceStore`]. [`FileStore`] is a
//! reference implementation grounded on the teacher's `ChainDB`
//! (`src/chaindb.rs`): one file per key under a data directory, opened and
//! written with `tokio::fs`, JSON-encoded snapshots for structured values.
//! Unlike `ChainDB` this module has no block/UTXO-specific API — it is the
//! generic byte-oriented `put`/`get`/`scan` surface spec.md §6.2 specifies,
//! with [`LedgerRecovery`] layered on top for the one recovery use case the
//! core actually has (replaying closed headers after a restart).

use crate::error::{CoreError, CoreResult};
use crate::model::LedgerHeader;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A byte-oriented append store: `put`/`get`/`scan` over opaque keys and
/// values, spec.md §6.2. Implementations decide their own durability and
/// concurrency story; the core only calls these at startup/shutdown
/// boundaries, never mid-transaction.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> CoreResult<()>;
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;
    /// Returns every key currently stored whose name starts with `prefix`,
    /// sorted, along with its value.
    async fn scan(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>>;
}

/// File-per-key reference implementation of [`PersistenceStore`], grounded
/// on `ChainDB::{open, append_block, load_block}`'s one-file-per-record
/// layout and `tokio::fs` usage.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if absent) a data directory as a [`FileStore`].
    pub async fn open(dir: impl Into<PathBuf>) -> CoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::Persistence(format!("create_dir_all {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Keys are opaque application strings (e.g. "header:42",
        // "ct:abcd..."); replace path separators so a key can never escape
        // the data directory.
        let sanitized = key.replace(['/', '\\'], "_");
        self.dir.join(sanitized)
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> CoreResult<()> {
        let path = self.key_path(key);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| CoreError::Persistence(format!("create {}: {}", path.display(), e)))?;
        file.write_all(bytes)
            .await
            .map_err(|e| CoreError::Persistence(format!("write {}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let path = self.key_path(key);
        match fs::File::open(&path).await {
            Ok(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)
                    .await
                    .map_err(|e| CoreError::Persistence(format!("read {}: {}", path.display(), e)))?;
                Ok(Some(buf))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::Persistence(format!("open {}: {}", path.display(), e))),
        }
    }

    async fn scan(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        let sanitized_prefix = prefix.replace(['/', '\\'], "_");
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| CoreError::Persistence(format!("read_dir {}: {}", self.dir.display(), e)))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::Persistence(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&sanitized_prefix) {
                continue;
            }
            let mut file = fs::File::open(entry.path())
                .await
                .map_err(|e| CoreError::Persistence(e.to_string()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf).await.map_err(|e| CoreError::Persistence(e.to_string()))?;
            out.push((name, buf));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// The one recovery use case the core has for [`PersistenceStore`]:
/// persisting closed headers so a restarted validator can reload the
/// chain tip without replaying every transaction.
pub struct LedgerRecovery<'a> {
    store: &'a dyn PersistenceStore,
}

const HEADER_PREFIX: &str = "header:";

impl<'a> LedgerRecovery<'a> {
    pub fn new(store: &'a dyn PersistenceStore) -> Self {
        Self { store }
    }

    /// Persists one closed header, keyed by its sequence number.
    pub async fn save_header(&self, header: &LedgerHeader) -> CoreResult<()> {
        let key = format!("{HEADER_PREFIX}{:020}", header.sequence);
        let bytes = serde_json::to_vec(header).map_err(|e| CoreError::Persistence(e.to_string()))?;
        self.store.put(&key, &bytes).await
    }

    /// Loads every persisted header, in ascending sequence order.
    pub async fn load_all_headers(&self) -> CoreResult<Vec<LedgerHeader>> {
        let entries = self.store.scan(HEADER_PREFIX).await?;
        entries
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(|e| CoreError::Persistence(e.to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(sequence: u64, parent_hash: &str) -> LedgerHeader {
        LedgerHeader {
            sequence,
            parent_hash: parent_hash.to_string(),
            tx_hash: "a".repeat(64),
            state_hash: "b".repeat(64),
            close_time: 1000,
            tx_count: 0,
            total_native: 100_000_000,
            hash: format!("hash-{sequence}"),
        }
    }

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let tmp = std::env::temp_dir().join(format!("valnode-core-test-{}", hex::encode(rand::random::<[u8; 8]>())));
        let store = FileStore::open(&tmp).await.unwrap();
        store.put("foo", b"bar").await.unwrap();
        assert_eq!(store.get("foo").await.unwrap(), Some(b"bar".to_vec()));
        assert_eq!(store.get("missing").await.unwrap(), None);
        let _ = fs::remove_dir_all(&tmp).await;
    }

    #[tokio::test]
    async fn ledger_recovery_reloads_headers_in_sequence_order() {
        let tmp = std::env::temp_dir().join(format!("valnode-core-test-{}", hex::encode(rand::random::<[u8; 8]>())));
        let store = FileStore::open(&tmp).await.unwrap();
        let recovery = LedgerRecovery::new(&store);
        recovery.save_header(&sample_header(2, "h1")).await.unwrap();
        recovery.save_header(&sample_header(1, LedgerHeader::genesis_parent_hash().as_str())).await.unwrap();

        let headers = recovery.load_all_headers().await.unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].sequence, 1);
        assert_eq!(headers[1].sequence, 2);
        let _ = fs::remove_dir_all(&tmp).await;
    }
}
