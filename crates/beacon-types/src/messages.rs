//! Client requests/replies and the internal propagation message

use crate::ledger::LedgerHandle;
use crate::roster::Roster;
use crate::round::{RandomnessRecord, RoundConfig, Transcript};
use serde::{Deserialize, Serialize};

/// One-time cluster configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRequest {
    pub roster: Roster,
    pub groups: u32,
    pub purpose: String,
    /// Interval in milliseconds between two random generations
    pub interval_ms: u64,
}

impl SetupRequest {
    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            groups: self.groups,
            purpose: self.purpose.clone(),
            interval_ms: self.interval_ms,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupReply {}

/// Request for collective randomness.
///
/// `index == 0` asks for the most recent value, any other index for the
/// round stored at that ledger position. Signed on the wire so that a
/// negative index reaches the service and is refused as a bad parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandRequest {
    #[serde(default)]
    pub index: i64,
}

/// Collective randomness with the transcript proving it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandReply {
    pub value: Vec<u8>,
    pub transcript: Transcript,
    pub index: u64,
}

impl From<RandomnessRecord> for RandReply {
    fn from(record: RandomnessRecord) -> Self {
        Self {
            value: record.value,
            transcript: record.transcript,
            index: record.round_index,
        }
    }
}

/// Sent to every roster member after a successful setup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagateSetup {
    #[serde(default)]
    pub genesis: Option<LedgerHandle>,
}
