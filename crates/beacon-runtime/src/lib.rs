//! Beacon Runtime - orchestration core of the randomness beacon
//!
//! This crate drives the beacon on one node:
//! - One-time setup that creates the genesis entry and starts production
//! - A background round scheduler with a per-round timeout
//! - Index-based queries over the published history
//! - Snapshot/restore of the minimal state needed to resume after restart
//!
//! The randomness protocol, the ledger and cluster notification are
//! consumed through traits; local implementations of each are provided
//! for single-node deployments and tests.

pub mod ledger;
pub mod local_protocol;
pub mod notifier;
pub mod persistence;
pub mod protocol;
pub mod publisher;
pub mod query;
pub mod registrar;
pub mod scheduler;
pub mod service;
pub mod state;

#[cfg(test)]
mod tests;

pub use ledger::{LedgerClient, LedgerError, MemoryLedger, SledLedger};
pub use local_protocol::LocalRoundProtocol;
pub use notifier::{ClusterNotifier, NoopNotifier};
pub use persistence::{PersistedSnapshot, PersistentStore};
pub use protocol::{ProtocolError, RoundParams, RoundProtocol, RoundSession};
pub use publisher::{LedgerPublisher, MemoryPublisher, RoundPublisher, StoragePolicy};
pub use scheduler::RoundScheduler;
pub use service::{BeaconConfig, BeaconService, BeaconServiceBuilder};
pub use state::{BeaconState, ReadySignal, RoundStats};

/// A round may take this many time units per cluster member
pub const ROUND_TIMEOUT_FACTOR: u32 = 2;

/// Default time unit for the round timeout in milliseconds
pub const DEFAULT_ROUND_TIMEOUT_UNIT_MS: u64 = 1000;

/// Default bound on how long setup waits for the first round
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 120;

/// Key the beacon snapshot is stored under
pub const SNAPSHOT_KEY: &str = "main";
