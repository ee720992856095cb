//! Test doubles and helpers shared by the flow tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_types::{
    BlockPayload, ClusterTopology, LedgerEntry, LedgerHandle, Member, PropagateSetup, Roster, SetupRequest,
    Transcript,
};
use parking_lot::Mutex;

use crate::{
    ledger::{LedgerClient, LedgerError, MemoryLedger},
    notifier::ClusterNotifier,
    protocol::{ProtocolError, RoundParams, RoundProtocol, RoundSession},
    service::{BeaconConfig, BeaconService},
};

/// What a scripted round does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Completes with a verifiable value
    Publish,
    /// Never completes
    Hang,
    /// Run fails
    Fail,
    /// Run completes but the value can't be retrieved
    NoRandom,
    /// Completes with a transcript that fails verification
    Unverifiable,
}

/// Round protocol that plays back a script, then repeats `fallback`
pub struct ScriptedProtocol {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    rounds: AtomicU64,
}

impl ScriptedProtocol {
    pub fn new(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            rounds: AtomicU64::new(0),
        })
    }

    fn transcript_for(value: &[u8]) -> Transcript {
        Transcript(blake3::hash(value).as_bytes().to_vec())
    }
}

impl RoundProtocol for ScriptedProtocol {
    fn create_round(&self, _topology: Arc<ClusterTopology>) -> Result<Box<dyn RoundSession>, ProtocolError> {
        let step = self.steps.lock().pop_front().unwrap_or(self.fallback);
        let round = self.rounds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession { step, round }))
    }

    fn verify(&self, value: &[u8], transcript: &Transcript) -> Result<(), ProtocolError> {
        if Self::transcript_for(value) == *transcript {
            Ok(())
        } else {
            Err(ProtocolError::InvalidTranscript("digest mismatch".to_string()))
        }
    }
}

struct ScriptedSession {
    step: Step,
    round: u64,
}

#[async_trait]
impl RoundSession for ScriptedSession {
    fn setup(&mut self, _params: &RoundParams) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ProtocolError> {
        match self.step {
            Step::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Step::Fail => Err(ProtocolError::Failed("scripted failure".to_string())),
            _ => Ok(()),
        }
    }

    fn random(&mut self) -> Result<(Vec<u8>, Transcript), ProtocolError> {
        let value = blake3::hash(&self.round.to_le_bytes()).as_bytes().to_vec();
        match self.step {
            Step::NoRandom => Err(ProtocolError::Unavailable("scripted".to_string())),
            Step::Unverifiable => Ok((value, Transcript(vec![0u8; 32]))),
            _ => {
                let transcript = ScriptedProtocol::transcript_for(&value);
                Ok((value, transcript))
            }
        }
    }
}

/// How a `FaultyLedger` breaks its chosen append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The append fails outright
    Storage,
    /// Another writer lands an entry at the tip first
    MoveTip,
}

/// Value carried by the entry a `Fault::MoveTip` writer appends
pub const FOREIGN_VALUE: [u8; 32] = [0xee; 32];

/// In-memory ledger whose `fault_at`-th append (1-based) goes wrong
pub struct FaultyLedger {
    inner: MemoryLedger,
    appends: AtomicU64,
    fault_at: u64,
    fault: Fault,
}

impl FaultyLedger {
    pub fn new(fault_at: u64, fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryLedger::new(),
            appends: AtomicU64::new(0),
            fault_at,
            fault,
        })
    }
}

#[async_trait]
impl LedgerClient for FaultyLedger {
    async fn create_genesis(&self, roster: &Roster, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        self.inner.create_genesis(roster, payload).await
    }

    async fn append(&self, anchor: &LedgerHandle, payload: Vec<u8>) -> Result<LedgerHandle, LedgerError> {
        let count = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
        if count == self.fault_at {
            match self.fault {
                Fault::Storage => return Err(LedgerError::Storage("disk full".to_string())),
                Fault::MoveTip => {
                    let tip = self.inner.fetch_history(anchor).await?.last().unwrap().handle.clone();
                    let foreign = BlockPayload::Round {
                        value: FOREIGN_VALUE.to_vec(),
                        transcript: Transcript(vec![]),
                    };
                    self.inner.append(&tip, foreign.to_bytes()).await?;
                }
            }
        }
        self.inner.append(anchor, payload).await
    }

    async fn fetch_history(&self, anchor: &LedgerHandle) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.inner.fetch_history(anchor).await
    }
}

/// Notifier that remembers who it was asked to notify
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, PropagateSetup)>>,
}

impl ClusterNotifier for RecordingNotifier {
    fn notify(&self, member: &Member, message: PropagateSetup) {
        self.sent.lock().push((member.id.clone(), message));
    }
}

pub fn roster(n: usize) -> Roster {
    Roster::new(
        (0..n)
            .map(|i| Member::new(format!("node-{}", i), format!("127.0.0.1:{}", 7000 + i)))
            .collect(),
    )
}

pub fn setup_request(members: usize, interval_ms: u64) -> SetupRequest {
    SetupRequest {
        roster: roster(members),
        groups: 2,
        purpose: "beacon-test".to_string(),
        interval_ms,
    }
}

/// Short timeouts so failing rounds don't slow the suite down
pub fn fast_config() -> BeaconConfig {
    BeaconConfig {
        round_timeout_unit: Duration::from_millis(5),
        ready_timeout: Duration::from_secs(5),
    }
}

pub async fn wait_for_published(service: &BeaconService, rounds: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while service.stats().rounds_published < rounds {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("rounds were not published in time");
}

pub async fn wait_for_attempts(service: &BeaconService, rounds: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while service.stats().rounds_attempted < rounds {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("rounds were not attempted in time");
}
