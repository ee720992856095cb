//! Local Round Protocol - hash commit/reveal over the topology
//!
//! Stands in for the external randomness protocol on development nodes.
//! Every member of the topology contributes a 32-byte secret, publishes a
//! commitment to it and reveals it. Members are split into groups
//! round-robin; each group's reveals are hashed into a group digest and the
//! digests are hashed into the final value. The transcript carries every
//! commitment and reveal, so anyone can recompute the value.
//!
//! All secrets are drawn by this process, so the result is only as honest
//! as this node. It exercises the beacon end to end; it is not the beacon
//! cryptography.

use crate::protocol::{ProtocolError, RoundParams, RoundProtocol, RoundSession};
use async_trait::async_trait;
use beacon_types::{ClusterTopology, Transcript};
use borsh::{BorshDeserialize, BorshSerialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
struct Contribution {
    member: String,
    group: u32,
    commitment: [u8; 32],
    secret: [u8; 32],
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
struct LocalTranscript {
    purpose: String,
    groups: u32,
    nonce: [u8; 16],
    contributions: Vec<Contribution>,
}

impl LocalTranscript {
    fn commitment(&self, member: &str, secret: &[u8; 32]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.purpose.as_bytes());
        hasher.update(&self.nonce);
        hasher.update(&(member.len() as u64).to_le_bytes());
        hasher.update(member.as_bytes());
        hasher.update(secret);
        *hasher.finalize().as_bytes()
    }

    /// Recompute the collective value from the reveals
    fn value(&self) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.purpose.as_bytes());
        hasher.update(&self.nonce);
        for group in 0..self.groups {
            let mut group_hasher = blake3::Hasher::new();
            group_hasher.update(&group.to_le_bytes());
            for c in self.contributions.iter().filter(|c| c.group == group) {
                group_hasher.update(&c.secret);
            }
            hasher.update(group_hasher.finalize().as_bytes());
        }
        hasher.finalize().as_bytes().to_vec()
    }
}

/// Commit/reveal round protocol run inside this process
#[derive(Debug, Clone, Default)]
pub struct LocalRoundProtocol {
    /// Simulated network time per round
    round_delay: Duration,
}

impl LocalRoundProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every round take at least `delay`
    pub fn with_round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }
}

impl RoundProtocol for LocalRoundProtocol {
    fn create_round(&self, topology: Arc<ClusterTopology>) -> Result<Box<dyn RoundSession>, ProtocolError> {
        Ok(Box::new(LocalSession {
            topology,
            params: None,
            outcome: None,
            round_delay: self.round_delay,
        }))
    }

    fn verify(&self, value: &[u8], transcript: &Transcript) -> Result<(), ProtocolError> {
        let decoded = LocalTranscript::try_from_slice(transcript.as_bytes())
            .map_err(|e| ProtocolError::InvalidTranscript(format!("undecodable: {}", e)))?;

        if decoded.groups == 0 || decoded.contributions.is_empty() {
            return Err(ProtocolError::InvalidTranscript("empty round".to_string()));
        }

        for group in 0..decoded.groups {
            if !decoded.contributions.iter().any(|c| c.group == group) {
                return Err(ProtocolError::InvalidTranscript(format!("group {} has no members", group)));
            }
        }

        for c in &decoded.contributions {
            if c.group >= decoded.groups {
                return Err(ProtocolError::InvalidTranscript(format!(
                    "{} assigned to unknown group {}",
                    c.member, c.group
                )));
            }
            if decoded.commitment(&c.member, &c.secret) != c.commitment {
                return Err(ProtocolError::InvalidTranscript(format!(
                    "reveal of {} does not match its commitment",
                    c.member
                )));
            }
        }

        if decoded.value() != value {
            return Err(ProtocolError::InvalidTranscript(
                "value does not match the reveals".to_string(),
            ));
        }

        Ok(())
    }
}

struct LocalSession {
    topology: Arc<ClusterTopology>,
    params: Option<RoundParams>,
    outcome: Option<(Vec<u8>, Transcript)>,
    round_delay: Duration,
}

impl LocalSession {
    fn contribute(&self, params: &RoundParams) -> (Vec<u8>, Transcript) {
        let mut transcript = LocalTranscript {
            purpose: params.purpose.clone(),
            groups: params.groups,
            nonce: rand::random(),
            contributions: Vec::with_capacity(self.topology.size()),
        };

        for (i, member) in self.topology.members().enumerate() {
            let secret: [u8; 32] = rand::random();
            let commitment = transcript.commitment(&member.id, &secret);
            transcript.contributions.push(Contribution {
                member: member.id.clone(),
                group: (i as u32) % params.groups,
                commitment,
                secret,
            });
        }

        let value = transcript.value();
        let bytes = borsh::to_vec(&transcript).expect("LocalTranscript serialization should not fail");
        (value, Transcript(bytes))
    }
}

#[async_trait]
impl RoundSession for LocalSession {
    fn setup(&mut self, params: &RoundParams) -> Result<(), ProtocolError> {
        if params.nodes != self.topology.size() {
            return Err(ProtocolError::InvalidParams(format!(
                "{} nodes requested for a topology of {}",
                params.nodes,
                self.topology.size()
            )));
        }
        if params.groups == 0 || params.groups as usize > params.nodes {
            return Err(ProtocolError::InvalidParams(format!(
                "{} groups for {} nodes",
                params.groups, params.nodes
            )));
        }
        self.params = Some(params.clone());
        Ok(())
    }

    async fn run(&mut self) -> Result<(), ProtocolError> {
        let params = self.params.clone().ok_or(ProtocolError::NotSetUp)?;

        if !self.round_delay.is_zero() {
            tokio::time::sleep(self.round_delay).await;
        }

        self.outcome = Some(self.contribute(&params));
        Ok(())
    }

    fn random(&mut self) -> Result<(Vec<u8>, Transcript), ProtocolError> {
        self.outcome
            .clone()
            .ok_or_else(|| ProtocolError::Unavailable("round has not completed".to_string()))
    }
}
