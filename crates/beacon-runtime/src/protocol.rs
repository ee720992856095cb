//! Round protocol abstraction
//!
//! A round protocol is the multi-party randomness generation the beacon
//! drives. The beacon only needs to create a session per round, run it,
//! read back the value and transcript, and verify the transcript.

use async_trait::async_trait;
use beacon_types::{ClusterTopology, Transcript};
use std::sync::Arc;
use thiserror::Error;

/// Parameters a session is configured with before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundParams {
    /// Number of members taking part
    pub nodes: usize,
    /// Number of groups the members are split into
    pub groups: u32,
    /// Purpose bound into the round
    pub purpose: String,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid round parameters: {0}")]
    InvalidParams(String),

    #[error("Round was not set up")]
    NotSetUp,

    #[error("Round failed: {0}")]
    Failed(String),

    #[error("No randomness available: {0}")]
    Unavailable(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),
}

/// Factory for round sessions plus the transcript verifier
pub trait RoundProtocol: Send + Sync {
    /// Create a fresh session bound to the topology
    fn create_round(&self, topology: Arc<ClusterTopology>) -> Result<Box<dyn RoundSession>, ProtocolError>;

    /// Check that `transcript` proves `value` was honestly generated
    fn verify(&self, value: &[u8], transcript: &Transcript) -> Result<(), ProtocolError>;
}

/// One execution of the protocol
#[async_trait]
pub trait RoundSession: Send {
    fn setup(&mut self, params: &RoundParams) -> Result<(), ProtocolError>;

    /// Start the round and resolve once it is done.
    ///
    /// Dropping the future abandons the round.
    async fn run(&mut self) -> Result<(), ProtocolError>;

    /// Collective randomness and transcript of a completed round
    fn random(&mut self) -> Result<(Vec<u8>, Transcript), ProtocolError>;
}
