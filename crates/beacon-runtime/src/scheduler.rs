//! Round Scheduler - the beacon's production loop
//!
//! Runs one randomness round every `interval_ms` for the lifetime of the
//! instance. Each round gets `2 × nodes` time units; a round that times
//! out, fails, or produces an unverifiable transcript is logged and
//! skipped. Nothing short of the stop signal ends the loop.

use crate::protocol::{ProtocolError, RoundParams};
use crate::service::BeaconCore;
use crate::ROUND_TIMEOUT_FACTOR;
use beacon_types::{BeaconError, ClusterTopology, RandomnessRecord, RoundConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

fn protocol_failure(e: ProtocolError) -> BeaconError {
    BeaconError::internal(format!("round protocol: {}", e))
}

/// Background task producing rounds
pub struct RoundScheduler {
    core: Arc<BeaconCore>,
    topology: Arc<ClusterTopology>,
    config: RoundConfig,
    shutdown: watch::Receiver<bool>,
}

impl RoundScheduler {
    pub(crate) fn new(
        core: Arc<BeaconCore>,
        topology: Arc<ClusterTopology>,
        config: RoundConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            core,
            topology,
            config,
            shutdown,
        }
    }

    /// Deadline for one round
    pub fn round_timeout(&self) -> Duration {
        let units = (self.topology.size() as u32).saturating_mul(ROUND_TIMEOUT_FACTOR);
        self.core.config.round_timeout_unit.saturating_mul(units)
    }

    /// Run until the stop signal
    pub async fn run(mut self) {
        let interval = Duration::from_millis(self.config.interval_ms);

        tracing::info!(
            "Round scheduler started ({} nodes rooted at {}, tree depth {}, {} groups, {}ms interval, {:?} round timeout)",
            self.topology.size(),
            self.topology.root().id,
            self.topology.depth(),
            self.config.groups,
            self.config.interval_ms,
            self.round_timeout()
        );

        {
            let mut state = self.core.state.lock().await;
            if let Err(e) = self.core.publisher.sync_latest(&mut state).await {
                tracing::error!("Couldn't sync with the ledger tip: {}", e);
            }
        }
        self.core.save_snapshot().await;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let round_start = Instant::now();
            self.core.stats.write().rounds_attempted += 1;

            match self.run_round().await {
                Ok(record) => {
                    let mut stats = self.core.stats.write();
                    stats.rounds_published += 1;
                    stats.last_published_index = Some(record.round_index);
                    drop(stats);

                    tracing::info!(
                        "Published round {} in {:.2}ms",
                        record.round_index,
                        round_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
                Err(e) => {
                    self.record_failure(&e);
                    tracing::warn!("While creating randomness: {}", e);
                }
            }

            self.core.save_snapshot().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        if self.core.ready.disarm() {
            tracing::warn!("Round scheduler stopped before the first round, releasing setup");
        }
        tracing::info!("Round scheduler stopped");
    }

    /// One round: create, run with deadline, retrieve, verify, publish
    async fn run_round(&self) -> Result<RandomnessRecord, BeaconError> {
        tracing::debug!("Creating randomness");

        let params = RoundParams {
            nodes: self.topology.size(),
            groups: self.config.groups,
            purpose: self.config.purpose.clone(),
        };

        let mut session = self
            .core
            .protocol
            .create_round(self.topology.clone())
            .map_err(protocol_failure)?;
        session.setup(&params).map_err(protocol_failure)?;

        let deadline = self.round_timeout();
        match tokio::time::timeout(deadline, session.run()).await {
            Ok(Ok(())) => tracing::debug!("Round done"),
            Ok(Err(e)) => return Err(protocol_failure(e)),
            Err(_) => return Err(BeaconError::Timeout(deadline)),
        }

        let (value, transcript) = session
            .random()
            .map_err(|e| BeaconError::internal(format!("couldn't retrieve randomness: {}", e)))?;

        self.core
            .protocol
            .verify(&value, &transcript)
            .map_err(|e| BeaconError::Verification(e.to_string()))?;
        tracing::debug!("Verification: ok");

        let mut state = self.core.state.lock().await;
        let record = self.core.publisher.publish(&mut state, value, transcript).await?;
        if self.core.ready.fire() {
            tracing::info!("First round published, releasing setup");
        }
        Ok(record)
    }

    fn record_failure(&self, error: &BeaconError) {
        let mut stats = self.core.stats.write();
        match error {
            BeaconError::Timeout(_) => stats.timeouts += 1,
            BeaconError::Verification(_) => stats.verification_failures += 1,
            _ => stats.failed_rounds += 1,
        }
    }
}
