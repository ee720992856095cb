//! Beacon Service - one beacon instance and its handle
//!
//! [`BeaconService`] is a cheap, cloneable handle over the instance state.
//! Request handlers live in `registrar` (setup), `query` (random) and
//! `persistence` (save/load); the background loop lives in `scheduler`.

use crate::notifier::{ClusterNotifier, NoopNotifier};
use crate::persistence::PersistentStore;
use crate::protocol::RoundProtocol;
use crate::publisher::{RoundPublisher, StoragePolicy};
use crate::scheduler::RoundScheduler;
use crate::state::{BeaconState, ReadySignal, RoundStats};
use crate::{DEFAULT_READY_TIMEOUT_SECS, DEFAULT_ROUND_TIMEOUT_UNIT_MS};
use beacon_types::{ClusterTopology, PropagateSetup, RoundConfig};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Runtime tuning
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// A round gets `2 × nodes` of these before it is abandoned
    pub round_timeout_unit: Duration,
    /// How long setup waits for the first round to publish
    pub ready_timeout: Duration,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            round_timeout_unit: Duration::from_millis(DEFAULT_ROUND_TIMEOUT_UNIT_MS),
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECS),
        }
    }
}

/// Everything a beacon instance owns
pub(crate) struct BeaconCore {
    /// The single lock over configured/latest/snapshot I/O
    pub(crate) state: Mutex<BeaconState>,
    pub(crate) protocol: Arc<dyn RoundProtocol>,
    pub(crate) publisher: Arc<dyn RoundPublisher>,
    pub(crate) notifier: Arc<dyn ClusterNotifier>,
    pub(crate) store: Option<Arc<PersistentStore>>,
    pub(crate) ready: ReadySignal,
    pub(crate) stats: RwLock<RoundStats>,
    pub(crate) config: BeaconConfig,
    shutdown_tx: watch::Sender<bool>,
    scheduler_started: AtomicBool,
    scheduler_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a beacon instance
#[derive(Clone)]
pub struct BeaconService {
    pub(crate) core: Arc<BeaconCore>,
}

impl BeaconService {
    pub fn builder(protocol: Arc<dyn RoundProtocol>) -> BeaconServiceBuilder {
        BeaconServiceBuilder::new(protocol)
    }

    pub async fn is_configured(&self) -> bool {
        self.core.state.lock().await.configured
    }

    /// Whether the round scheduler has been started
    pub fn is_scheduling(&self) -> bool {
        self.core.scheduler_started.load(Ordering::SeqCst)
    }

    /// Snapshot of the scheduler counters
    pub fn stats(&self) -> RoundStats {
        self.core.stats.read().clone()
    }

    pub fn storage_policy(&self) -> &'static str {
        self.core.publisher.name()
    }

    /// Handle the propagation message sent by the node that ran setup
    pub async fn handle_propagate(&self, message: PropagateSetup) {
        {
            let mut state = self.core.state.lock().await;
            if state.configured {
                tracing::debug!("Ignoring setup propagation, already configured");
                return;
            }
            state.configured = true;
        }

        match message.genesis {
            Some(genesis) => tracing::info!(
                "Marked configured by propagation (chain tip index {})",
                genesis.index
            ),
            None => tracing::info!("Marked configured by propagation"),
        }
        self.save().await;
    }

    /// Spawn the round scheduler. Returns false if it was already started.
    pub(crate) fn start_scheduler(&self, topology: Arc<ClusterTopology>, config: RoundConfig) -> bool {
        if self.core.scheduler_started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Round scheduler already running");
            return false;
        }

        let scheduler = RoundScheduler::new(
            self.core.clone(),
            topology,
            config,
            self.core.shutdown_tx.subscribe(),
        );
        let handle = tokio::spawn(scheduler.run());
        *self.core.scheduler_handle.lock() = Some(handle);
        true
    }

    /// Stop the round scheduler and wait for it to finish its current step
    pub async fn shutdown(&self) {
        // Stored even when no scheduler has subscribed yet
        self.core.shutdown_tx.send_replace(true);

        let handle = self.core.scheduler_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Round scheduler task failed: {}", e);
            }
        }
        self.save().await;
    }
}

/// Builder for BeaconService
pub struct BeaconServiceBuilder {
    protocol: Arc<dyn RoundProtocol>,
    policy: StoragePolicy,
    notifier: Arc<dyn ClusterNotifier>,
    store: Option<Arc<PersistentStore>>,
    config: BeaconConfig,
}

impl BeaconServiceBuilder {
    pub fn new(protocol: Arc<dyn RoundProtocol>) -> Self {
        Self {
            protocol,
            policy: StoragePolicy::InMemory,
            notifier: Arc::new(NoopNotifier),
            store: None,
            config: BeaconConfig::default(),
        }
    }

    pub fn storage_policy(mut self, policy: StoragePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ClusterNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn persistent_store(mut self, store: Arc<PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: BeaconConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> BeaconService {
        let (shutdown_tx, _) = watch::channel(false);

        BeaconService {
            core: Arc::new(BeaconCore {
                state: Mutex::new(BeaconState::default()),
                protocol: self.protocol,
                publisher: self.policy.into_publisher(),
                notifier: self.notifier,
                store: self.store,
                ready: ReadySignal::new(),
                stats: RwLock::new(RoundStats::default()),
                config: self.config,
                shutdown_tx,
                scheduler_started: AtomicBool::new(false),
                scheduler_handle: parking_lot::Mutex::new(None),
            }),
        }
    }
}
