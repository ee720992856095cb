//! Ledger Client - append-only, index-ordered storage for published rounds
//!
//! The beacon only depends on the three operations of [`LedgerClient`].
//! Two local implementations are provided: [`MemoryLedger`] for tests and
//! single-process runs, and [`SledLedger`] which keeps chains on disk next
//! to the beacon snapshot. Neither replicates anything.

use crate::persistence::PersistentStore;
use async_trait::async_trait;
use beacon_types::{LedgerEntry, LedgerHandle, Roster, HASH_LEN};
use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown chain")]
    UnknownChain,

    #[error("Anchor at index {anchor} is not the chain tip (tip is {tip})")]
    StaleAnchor { anchor: u64, tip: u64 },

    #[error("Anchor hash does not match entry {0}")]
    HashMismatch(u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Client for the external ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Create a new chain whose first entry carries `payload`
    async fn create_genesis(&self, roster: &Roster, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError>;

    /// Append `payload` after `anchor`, which must be the current tip
    async fn append(&self, anchor: &LedgerHandle, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError>;

    /// All entries of the chain `anchor` belongs to, genesis first
    async fn fetch_history(&self, anchor: &LedgerHandle) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// Hash identifying a new chain
pub(crate) fn genesis_hash(roster: &Roster, payload: &[u8]) -> [u8; HASH_LEN] {
    let nonce: [u8; 16] = rand::random();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&nonce);
    for member in roster.iter() {
        hasher.update(&(member.id.len() as u64).to_le_bytes());
        hasher.update(member.id.as_bytes());
    }
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

/// Hash of an entry chained to its predecessor
fn entry_hash(prev: &[u8; HASH_LEN], index: u64, payload: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev);
    hasher.update(&index.to_le_bytes());
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

fn check_anchor(tip: &LedgerHandle, anchor: &LedgerHandle) -> Result<(), LedgerError> {
    if anchor.index != tip.index {
        return Err(LedgerError::StaleAnchor {
            anchor: anchor.index,
            tip: tip.index,
        });
    }
    if anchor.hash != tip.hash {
        return Err(LedgerError::HashMismatch(anchor.index));
    }
    Ok(())
}

fn next_handle(tip: &LedgerHandle, payload: &[u8]) -> LedgerHandle {
    let index = tip.index + 1;
    LedgerHandle {
        chain_id: tip.chain_id,
        index,
        hash: entry_hash(&tip.hash, index, payload),
    }
}

fn genesis_entry(roster: &Roster, payload: Vec<u8>) -> LedgerEntry {
    let chain_id = genesis_hash(roster, &payload);
    LedgerEntry {
        handle: LedgerHandle {
            chain_id,
            index: 0,
            hash: chain_id,
        },
        payload,
    }
}

/// In-memory ledger
#[derive(Default)]
pub struct MemoryLedger {
    chains: DashMap<[u8; HASH_LEN], Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chains held
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn create_genesis(&self, roster: &Roster, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        let entry = genesis_entry(roster, payload);
        let handle = entry.handle.clone();
        self.chains.insert(handle.chain_id, vec![entry]);
        Ok(handle)
    }

    async fn append(&self, anchor: &LedgerHandle, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        let mut chain = self
            .chains
            .get_mut(&anchor.chain_id)
            .ok_or(LedgerError::UnknownChain)?;

        let tip = chain.last().ok_or(LedgerError::UnknownChain)?.handle.clone();
        check_anchor(&tip, anchor)?;

        let handle = next_handle(&tip, &payload);
        chain.push(LedgerEntry {
            handle: handle.clone(),
            payload,
        });
        Ok(handle)
    }

    async fn fetch_history(&self, anchor: &LedgerHandle) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.chains
            .get(&anchor.chain_id)
            .map(|chain| chain.value().clone())
            .ok_or(LedgerError::UnknownChain)
    }
}

/// Ledger kept in the node's sled database
pub struct SledLedger {
    entries: sled::Tree,
    /// Serializes appends so the tip check and insert are atomic
    append_lock: Mutex<()>,
}

impl SledLedger {
    /// Open the ledger tree of a persistent store
    pub fn open(store: &PersistentStore) -> anyhow::Result<Self> {
        Ok(Self {
            entries: store.open_tree("ledger")?,
            append_lock: Mutex::new(()),
        })
    }

    fn key(chain_id: &[u8; HASH_LEN], index: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(HASH_LEN + 8);
        key.extend_from_slice(chain_id);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    fn insert(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(entry).map_err(|e| LedgerError::Storage(e.to_string()))?;
        self.entries
            .insert(Self::key(&entry.handle.chain_id, entry.handle.index), bytes)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        self.entries
            .flush()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<LedgerEntry, LedgerError> {
        bincode::deserialize(bytes).map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn tip(&self, chain_id: &[u8; HASH_LEN]) -> Result<LedgerEntry, LedgerError> {
        match self.entries.scan_prefix(chain_id).next_back() {
            Some(Ok((_, bytes))) => Self::decode(&bytes),
            Some(Err(e)) => Err(LedgerError::Storage(e.to_string())),
            None => Err(LedgerError::UnknownChain),
        }
    }
}

#[async_trait]
impl LedgerClient for SledLedger {
    async fn create_genesis(&self, roster: &Roster, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        let entry = genesis_entry(roster, payload);
        self.insert(&entry)?;
        tracing::debug!("Created ledger chain at index {}", entry.handle.index);
        Ok(entry.handle)
    }

    async fn append(&self, anchor: &LedgerHandle, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        let _guard = self.append_lock.lock();

        let tip = self.tip(&anchor.chain_id)?.handle;
        check_anchor(&tip, anchor)?;

        let handle = next_handle(&tip, &payload);
        self.insert(&LedgerEntry {
            handle: handle.clone(),
            payload,
        })?;
        Ok(handle)
    }

    async fn fetch_history(&self, anchor: &LedgerHandle) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut history = Vec::new();
        for item in self.entries.scan_prefix(anchor.chain_id) {
            let (_, bytes) = item.map_err(|e| LedgerError::Storage(e.to_string()))?;
            history.push(Self::decode(&bytes)?);
        }

        if history.is_empty() {
            return Err(LedgerError::UnknownChain);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::Member;
    use tempfile::tempdir;

    fn roster() -> Roster {
        Roster::new(vec![
            Member::new("a", "127.0.0.1:7001"),
            Member::new("b", "127.0.0.1:7002"),
        ])
    }

    async fn exercise_chain(ledger: &dyn LedgerClient) {
        let genesis = ledger.create_genesis(&roster(), vec![0]).await.unwrap();
        assert_eq!(genesis.index, 0);

        let first = ledger.append(&genesis, vec![1]).await.unwrap();
        let second = ledger.append(&first, vec![2]).await.unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert_eq!(second.chain_id, genesis.chain_id);

        let history = ledger.fetch_history(&genesis).await.unwrap();
        let indices: Vec<u64> = history.iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(history[2].payload, vec![2]);

        // Appending from anything but the tip is refused
        let err = ledger.append(&first, vec![3]).await.unwrap_err();
        assert!(matches!(err, LedgerError::StaleAnchor { anchor: 1, tip: 2 }));

        let forged = LedgerHandle {
            hash: [0u8; HASH_LEN],
            ..second.clone()
        };
        let err = ledger.append(&forged, vec![3]).await.unwrap_err();
        assert!(matches!(err, LedgerError::HashMismatch(2)));
    }

    #[tokio::test]
    async fn test_memory_ledger_chain() {
        exercise_chain(&MemoryLedger::new()).await;
    }

    #[tokio::test]
    async fn test_sled_ledger_chain() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();
        let ledger = SledLedger::open(&store).unwrap();
        exercise_chain(&ledger).await;
    }

    #[tokio::test]
    async fn test_sled_ledger_keeps_chains_apart() {
        let dir = tempdir().unwrap();
        let store = PersistentStore::open(dir.path()).unwrap();
        let ledger = SledLedger::open(&store).unwrap();

        let a = ledger.create_genesis(&roster(), vec![10]).await.unwrap();
        let b = ledger.create_genesis(&roster(), vec![10]).await.unwrap();
        assert_ne!(a.chain_id, b.chain_id);

        ledger.append(&a, vec![11]).await.unwrap();

        assert_eq!(ledger.fetch_history(&a).await.unwrap().len(), 2);
        assert_eq!(ledger.fetch_history(&b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_chain() {
        let ledger = MemoryLedger::new();
        let handle = LedgerHandle {
            chain_id: [1u8; HASH_LEN],
            index: 0,
            hash: [1u8; HASH_LEN],
        };
        assert!(matches!(
            ledger.fetch_history(&handle).await,
            Err(LedgerError::UnknownChain)
        ));
    }
}
