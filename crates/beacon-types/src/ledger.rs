//! Ledger handles and the payload stored in ledger entries

use crate::error::BeaconError;
use crate::roster::Roster;
use crate::round::{RandomnessRecord, RoundConfig, Transcript};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub const HASH_LEN: usize = 32;

/// Points at one entry of one ledger chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerHandle {
    /// Hash of the genesis entry, identifies the chain
    pub chain_id: [u8; HASH_LEN],
    /// Position in the chain, genesis is 0
    pub index: u64,
    /// Hash of this entry
    pub hash: [u8; HASH_LEN],
}

/// A stored entry as returned by `fetch_history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub handle: LedgerHandle,
    pub payload: Vec<u8>,
}

impl LedgerEntry {
    pub fn index(&self) -> u64 {
        self.handle.index
    }
}

/// Everything needed to resume a beacon from its genesis entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisRecord {
    pub handle: LedgerHandle,
    pub roster: Roster,
    pub payload: Vec<u8>,
}

/// Content of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum BlockPayload {
    /// First entry of a chain, carries the round configuration
    Genesis(RoundConfig),
    /// A verified round result
    Round { value: Vec<u8>, transcript: Transcript },
}

impl BlockPayload {
    /// Serialize for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("BlockPayload serialization should not fail")
    }

    /// Deserialize from storage
    pub fn from_bytes(data: &[u8]) -> Result<Self, borsh::io::Error> {
        borsh::from_slice(data)
    }

    /// Recover the round configuration from a genesis payload
    pub fn decode_genesis(data: &[u8]) -> Result<RoundConfig, BeaconError> {
        match Self::from_bytes(data) {
            Ok(BlockPayload::Genesis(config)) => Ok(config),
            Ok(BlockPayload::Round { .. }) => Err(BeaconError::internal(
                "genesis entry does not carry a round configuration",
            )),
            Err(e) => Err(BeaconError::internal(format!(
                "couldn't decode genesis payload: {}",
                e
            ))),
        }
    }

    /// Decode a round entry into the record returned to clients
    pub fn decode_round(entry: &LedgerEntry) -> Result<RandomnessRecord, BeaconError> {
        match Self::from_bytes(&entry.payload) {
            Ok(BlockPayload::Round { value, transcript }) => Ok(RandomnessRecord {
                value,
                transcript,
                round_index: entry.index(),
            }),
            Ok(BlockPayload::Genesis(_)) => Err(BeaconError::internal(format!(
                "wrong data type in ledger entry {}",
                entry.index()
            ))),
            Err(e) => Err(BeaconError::internal(format!(
                "couldn't decode ledger entry {}: {}",
                entry.index(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(index: u64) -> LedgerHandle {
        LedgerHandle {
            chain_id: [7u8; HASH_LEN],
            index,
            hash: [index as u8; HASH_LEN],
        }
    }

    #[test]
    fn test_genesis_payload_recovers_config() {
        let config = RoundConfig {
            groups: 2,
            purpose: "beacon-test".to_string(),
            interval_ms: 100,
        };
        let bytes = BlockPayload::Genesis(config.clone()).to_bytes();

        assert_eq!(BlockPayload::decode_genesis(&bytes).unwrap(), config);
    }

    #[test]
    fn test_round_payload_is_not_genesis() {
        let bytes = BlockPayload::Round {
            value: vec![1, 2, 3],
            transcript: Transcript(vec![4]),
        }
        .to_bytes();

        assert!(matches!(
            BlockPayload::decode_genesis(&bytes),
            Err(BeaconError::Internal(_))
        ));
    }

    #[test]
    fn test_decode_round_stamps_index() {
        let entry = LedgerEntry {
            handle: handle(3),
            payload: BlockPayload::Round {
                value: vec![9; 32],
                transcript: Transcript(vec![1, 1]),
            }
            .to_bytes(),
        };

        let record = BlockPayload::decode_round(&entry).unwrap();
        assert_eq!(record.round_index, 3);
        assert_eq!(record.value, vec![9; 32]);
    }

    #[test]
    fn test_garbage_payload_is_internal_error() {
        let entry = LedgerEntry {
            handle: handle(1),
            payload: vec![0xff, 0xee],
        };
        assert!(matches!(
            BlockPayload::decode_round(&entry),
            Err(BeaconError::Internal(_))
        ));
    }
}
