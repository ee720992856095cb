//! Shared beacon state
//!
//! [`BeaconState`] is guarded by the single per-instance lock held in the
//! service. The ready signal and the round statistics sit beside it.

use beacon_types::{ClusterTopology, GenesisRecord, LedgerHandle, RandomnessRecord, RoundConfig};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Mutable state of one beacon instance
#[derive(Debug, Default)]
pub struct BeaconState {
    /// Set once, by setup, propagation or restore
    pub configured: bool,
    /// Genesis of the chain this node produces into
    pub genesis: Option<GenesisRecord>,
    /// Most recent entry this node knows of
    pub latest: Option<LedgerHandle>,
    pub round_config: Option<RoundConfig>,
    pub topology: Option<Arc<ClusterTopology>>,
    /// Last published record
    pub latest_record: Option<RandomnessRecord>,
}

impl BeaconState {
    /// Record the one-time configuration of a producing node
    pub fn configure(&mut self, config: RoundConfig, topology: Arc<ClusterTopology>, genesis: GenesisRecord) {
        self.configured = true;
        self.round_config = Some(config);
        self.topology = Some(topology);
        self.latest = Some(genesis.handle.clone());
        self.genesis = Some(genesis);
    }

    /// Move `latest` forward. Handles at or behind the current one are ignored.
    pub fn advance_latest(&mut self, handle: LedgerHandle) -> bool {
        match &self.latest {
            Some(current) if current.index >= handle.index => false,
            _ => {
                self.latest = Some(handle);
                true
            }
        }
    }
}

/// One-shot rendezvous between setup and the first published round.
///
/// Setup arms it and waits on the receiver; the scheduler fires it after
/// publishing. Firing an unarmed or already fired signal does nothing.
/// Disarming drops the sender, so a waiter sees the channel close.
#[derive(Debug, Default)]
pub struct ReadySignal {
    slot: Mutex<Option<oneshot::Sender<()>>>,
}

impl ReadySignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.slot.lock() = Some(tx);
        rx
    }

    /// Returns true if a waiter was released
    pub fn fire(&self) -> bool {
        match self.slot.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Drop a pending sender without firing. Returns true if one was armed.
    pub fn disarm(&self) -> bool {
        self.slot.lock().take().is_some()
    }
}

/// Counters kept by the round scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundStats {
    pub rounds_attempted: u64,
    pub rounds_published: u64,
    pub timeouts: u64,
    pub verification_failures: u64,
    /// Session, retrieval and publish failures
    pub failed_rounds: u64,
    pub last_published_index: Option<u64>,
}
