//! Round configuration and published randomness

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Parameters every round runs with. Stored in the genesis entry.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Number of protocol groups the cluster is split into
    pub groups: u32,
    /// Free-form purpose string bound into every round
    pub purpose: String,
    /// Pause between two rounds in milliseconds
    pub interval_ms: u64,
}

/// Opaque evidence that a value was honestly generated.
///
/// Only the round protocol knows its layout; everything else moves it
/// around as bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transcript(pub Vec<u8>);

impl Transcript {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Transcript {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// A published randomness value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRecord {
    pub value: Vec<u8>,
    pub transcript: Transcript,
    /// Ledger position of the entry, 0 for genesis
    pub round_index: u64,
}
