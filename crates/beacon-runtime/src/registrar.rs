//! Configuration Registrar - the one-time setup request

use crate::service::BeaconService;
use beacon_types::{BeaconError, ClusterTopology, PropagateSetup, Roster, SetupReply, SetupRequest};
use std::sync::Arc;

impl BeaconService {
    /// Configure the beacon and block until the first round is published.
    ///
    /// Setup happens at most once per instance: every later call, including
    /// concurrent ones, fails with `AlreadyConfigured`.
    pub async fn setup(&self, request: SetupRequest) -> Result<SetupReply, BeaconError> {
        let config = request.round_config();

        let (ready, topology, genesis) = {
            let mut state = self.core.state.lock().await;
            if state.configured {
                return Err(BeaconError::AlreadyConfigured);
            }

            if request.groups == 0 {
                return Err(BeaconError::invalid("groups must be at least 1"));
            }
            if request.interval_ms == 0 {
                return Err(BeaconError::invalid("interval_ms must be at least 1"));
            }
            let topology = Arc::new(ClusterTopology::binary_tree(&request.roster)?);
            if request.groups as usize > topology.size() {
                return Err(BeaconError::invalid(format!(
                    "{} groups for {} members",
                    request.groups,
                    topology.size()
                )));
            }

            let genesis = self
                .core
                .publisher
                .create_genesis(&request.roster, &config)
                .await?;

            state.configure(config.clone(), topology.clone(), genesis.clone());
            (self.core.ready.arm(), topology, genesis)
        };

        tracing::info!(
            "Beacon set up: {} members, {} groups, purpose {:?}, {}ms interval ({} storage)",
            topology.size(),
            config.groups,
            config.purpose,
            config.interval_ms,
            self.storage_policy()
        );

        self.propagate(&request.roster, PropagateSetup {
            genesis: Some(genesis.handle),
        });
        self.start_scheduler(topology, config);

        let ready_timeout = self.core.config.ready_timeout;
        match tokio::time::timeout(ready_timeout, ready).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(BeaconError::internal(
                    "round scheduler stopped before the first round was published",
                ))
            }
            Err(_) => {
                tracing::warn!("No round published within {:?} of setup", ready_timeout);
                return Err(BeaconError::internal(format!(
                    "first round not published within {:?}",
                    ready_timeout
                )));
            }
        }

        self.save().await;
        Ok(SetupReply {})
    }

    /// Tell every member the beacon is configured. Nothing is awaited.
    fn propagate(&self, roster: &Roster, message: PropagateSetup) {
        for member in roster.iter() {
            self.core.notifier.notify(member, message.clone());
        }
        tracing::debug!("Propagated setup to {} members", roster.len());
    }
}
