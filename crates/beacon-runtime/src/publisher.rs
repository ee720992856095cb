//! Round publishers - where verified rounds go and how they are read back
//!
//! Two storage policies, chosen when the service is built:
//! - [`LedgerPublisher`] appends every round to the ledger and answers
//!   historical queries from it.
//! - [`MemoryPublisher`] keeps only the latest round in memory. Any query
//!   index returns that round.

use crate::ledger::{genesis_hash, LedgerClient, LedgerError};
use crate::state::BeaconState;
use async_trait::async_trait;
use beacon_types::{
    BeaconError, BlockPayload, GenesisRecord, LedgerHandle, RandomnessRecord, Roster, RoundConfig,
    Transcript,
};
use std::sync::Arc;

#[async_trait]
pub trait RoundPublisher: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Create the genesis entry carrying the round configuration
    async fn create_genesis(&self, roster: &Roster, config: &RoundConfig) -> Result<GenesisRecord, BeaconError>;

    /// Bring `state.latest` up to the stored tip
    async fn sync_latest(&self, state: &mut BeaconState) -> Result<(), BeaconError>;

    /// Store a verified round
    async fn publish(
        &self,
        state: &mut BeaconState,
        value: Vec<u8>,
        transcript: Transcript,
    ) -> Result<RandomnessRecord, BeaconError>;

    /// Look up a round, `index == 0` meaning the latest
    async fn fetch(&self, state: &BeaconState, index: u64) -> Result<RandomnessRecord, BeaconError>;
}

/// Storage policy selected at construction
#[derive(Clone)]
pub enum StoragePolicy {
    Ledger(Arc<dyn LedgerClient>),
    InMemory,
}

impl StoragePolicy {
    pub fn into_publisher(self) -> Arc<dyn RoundPublisher> {
        match self {
            StoragePolicy::Ledger(ledger) => Arc::new(LedgerPublisher::new(ledger)),
            StoragePolicy::InMemory => Arc::new(MemoryPublisher),
        }
    }
}

fn ledger_failure(context: &str, e: LedgerError) -> BeaconError {
    BeaconError::internal(format!("{}: {}", context, e))
}

/// Publishes every round to the ledger
pub struct LedgerPublisher {
    ledger: Arc<dyn LedgerClient>,
}

impl LedgerPublisher {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    fn anchor(state: &BeaconState) -> Result<LedgerHandle, BeaconError> {
        state
            .latest
            .clone()
            .or_else(|| state.genesis.as_ref().map(|g| g.handle.clone()))
            .ok_or_else(|| BeaconError::internal("no ledger anchor to publish after"))
    }
}

#[async_trait]
impl RoundPublisher for LedgerPublisher {
    fn name(&self) -> &'static str {
        "ledger"
    }

    async fn create_genesis(&self, roster: &Roster, config: &RoundConfig) -> Result<GenesisRecord, BeaconError> {
        let payload = BlockPayload::Genesis(config.clone()).to_bytes();
        let handle = self
            .ledger
            .create_genesis(roster, payload.clone())
            .await
            .map_err(|e| ledger_failure("couldn't create genesis entry", e))?;

        Ok(GenesisRecord {
            handle,
            roster: roster.clone(),
            payload,
        })
    }

    async fn sync_latest(&self, state: &mut BeaconState) -> Result<(), BeaconError> {
        let genesis = match &state.genesis {
            Some(genesis) => genesis.handle.clone(),
            None => return Err(BeaconError::NotConfigured),
        };

        let history = self
            .ledger
            .fetch_history(&genesis)
            .await
            .map_err(|e| ledger_failure("error while updating ledger", e))?;

        if let Some(tip) = history.last() {
            if state.advance_latest(tip.handle.clone()) {
                tracing::info!("Updated latest entry to index {}", tip.index());
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        state: &mut BeaconState,
        value: Vec<u8>,
        transcript: Transcript,
    ) -> Result<RandomnessRecord, BeaconError> {
        let anchor = Self::anchor(state)?;
        let payload = BlockPayload::Round {
            value: value.clone(),
            transcript: transcript.clone(),
        }
        .to_bytes();

        let handle = match self.ledger.append(&anchor, payload).await {
            Ok(handle) => handle,
            Err(e @ LedgerError::StaleAnchor { .. }) => {
                // Someone else moved the tip; anchor the next round there
                if let Err(sync_err) = self.sync_latest(state).await {
                    tracing::error!("Couldn't resync ledger tip: {}", sync_err);
                }
                return Err(ledger_failure("couldn't store new entry", e));
            }
            Err(e) => return Err(ledger_failure("couldn't store new entry", e)),
        };

        let record = RandomnessRecord {
            value,
            transcript,
            round_index: handle.index,
        };
        state.advance_latest(handle);
        state.latest_record = Some(record.clone());
        Ok(record)
    }

    async fn fetch(&self, state: &BeaconState, index: u64) -> Result<RandomnessRecord, BeaconError> {
        let genesis = state.genesis.as_ref().ok_or(BeaconError::NotConfigured)?;

        let history = self
            .ledger
            .fetch_history(&genesis.handle)
            .await
            .map_err(|e| ledger_failure("error while updating ledger", e))?;

        // The genesis entry carries configuration, not randomness
        let rounds = history.len().saturating_sub(1) as u64;
        if rounds == 0 {
            return Err(BeaconError::NotConfigured);
        }
        if index > rounds {
            return Err(BeaconError::invalid(format!(
                "index {} beyond the {} published rounds",
                index, rounds
            )));
        }

        let entry = if index == 0 {
            &history[history.len() - 1]
        } else {
            &history[index as usize]
        };
        BlockPayload::decode_round(entry)
    }
}

/// Keeps only the most recent round
pub struct MemoryPublisher;

#[async_trait]
impl RoundPublisher for MemoryPublisher {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_genesis(&self, roster: &Roster, config: &RoundConfig) -> Result<GenesisRecord, BeaconError> {
        let payload = BlockPayload::Genesis(config.clone()).to_bytes();
        let chain_id = genesis_hash(roster, &payload);

        Ok(GenesisRecord {
            handle: LedgerHandle {
                chain_id,
                index: 0,
                hash: chain_id,
            },
            roster: roster.clone(),
            payload,
        })
    }

    async fn sync_latest(&self, _state: &mut BeaconState) -> Result<(), BeaconError> {
        Ok(())
    }

    async fn publish(
        &self,
        state: &mut BeaconState,
        value: Vec<u8>,
        transcript: Transcript,
    ) -> Result<RandomnessRecord, BeaconError> {
        let round_index = state
            .latest_record
            .as_ref()
            .map(|r| r.round_index + 1)
            .unwrap_or(1);

        let record = RandomnessRecord {
            value,
            transcript,
            round_index,
        };
        state.latest_record = Some(record.clone());
        Ok(record)
    }

    async fn fetch(&self, state: &BeaconState, _index: u64) -> Result<RandomnessRecord, BeaconError> {
        state.latest_record.clone().ok_or(BeaconError::NotConfigured)
    }
}
