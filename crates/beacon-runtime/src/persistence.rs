//! Persistence Layer for beacon state
//!
//! Uses sled embedded database to keep the minimal state needed to resume
//! after a restart: whether the beacon was configured and its genesis
//! record. The snapshot is rewritten after setup and after every round.

use crate::service::{BeaconCore, BeaconService};
use crate::state::BeaconState;
use crate::SNAPSHOT_KEY;
use beacon_types::{BeaconError, BlockPayload, ClusterTopology, GenesisRecord};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// What survives a restart
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSnapshot {
    pub configured: bool,
    pub genesis: Option<GenesisRecord>,
    /// Unix timestamp of the save
    pub saved_at: i64,
}

impl PersistedSnapshot {
    pub fn from_state(state: &BeaconState) -> Self {
        Self {
            configured: state.configured,
            genesis: state.genesis.clone(),
            saved_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Persistent storage for beacon state
pub struct PersistentStore {
    /// Sled database instance
    db: Db,
    /// Snapshot tree
    snapshots: sled::Tree,
}

impl PersistentStore {
    /// Open or create a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let snapshots = db.open_tree("snapshots")?;

        tracing::info!("Opened persistent store at {:?}", path.as_ref());

        Ok(Self { db, snapshots })
    }

    /// Open another tree in the same database
    pub fn open_tree(&self, name: &str) -> anyhow::Result<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }

    /// Save the beacon snapshot
    pub fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> anyhow::Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        self.snapshots.insert(SNAPSHOT_KEY, bytes)?;
        self.flush()
    }

    /// Load the beacon snapshot
    pub fn load_snapshot(&self) -> anyhow::Result<Option<PersistedSnapshot>> {
        match self.snapshots.get(SNAPSHOT_KEY)? {
            Some(bytes) => {
                let snapshot: PersistedSnapshot = bincode::deserialize(&bytes)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn insert_raw(&self, bytes: &[u8]) -> anyhow::Result<()> {
        self.snapshots.insert(SNAPSHOT_KEY, bytes)?;
        Ok(())
    }
}

impl BeaconCore {
    /// Write the snapshot while holding the state lock. Failures are logged only.
    pub(crate) async fn save_snapshot(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        let state = self.state.lock().await;
        let snapshot = PersistedSnapshot::from_state(&state);
        if let Err(e) = store.save_snapshot(&snapshot) {
            tracing::error!("Couldn't save beacon snapshot: {}", e);
        }
    }
}

impl BeaconService {
    /// Persist the current state
    pub async fn save(&self) {
        self.core.save_snapshot().await;
    }

    /// Restore persisted state, resuming round production if a genesis
    /// record was saved.
    ///
    /// Returns whether the scheduler was resumed. On error the instance is
    /// left untouched and unconfigured.
    pub async fn load(&self) -> Result<bool, BeaconError> {
        let Some(store) = self.core.store.as_ref() else {
            return Ok(false);
        };

        let snapshot = store
            .load_snapshot()
            .map_err(|e| BeaconError::internal(format!("data of wrong type in snapshot: {}", e)))?;

        let Some(snapshot) = snapshot else {
            tracing::info!("No persisted beacon state found, starting unconfigured");
            return Ok(false);
        };

        let Some(genesis) = snapshot.genesis else {
            if snapshot.configured {
                self.core.state.lock().await.configured = true;
                tracing::info!("Restored configured flag (no local chain)");
            }
            return Ok(false);
        };

        let config = BlockPayload::decode_genesis(&genesis.payload)?;
        let topology = ClusterTopology::binary_tree(&genesis.roster)
            .map_err(|e| BeaconError::internal(format!("couldn't rebuild topology: {}", e)))?;
        let topology = Arc::new(topology);

        {
            let mut state = self.core.state.lock().await;
            if state.configured {
                return Err(BeaconError::AlreadyConfigured);
            }
            state.configure(config.clone(), topology.clone(), genesis);
        }

        tracing::info!(
            "Restored beacon state ({} members, {} groups), resuming rounds",
            topology.size(),
            config.groups
        );
        self.start_scheduler(topology, config);
        Ok(true)
    }
}
