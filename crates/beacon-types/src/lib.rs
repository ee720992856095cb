//! Beacon Types - shared data model for the randomness beacon
//!
//! Everything that crosses a process boundary lives here:
//! - Client requests/replies (`Setup`, `Random`) and the internal propagation message
//! - Round configuration stored in the genesis entry
//! - Roster and the binary-tree topology rounds run over
//! - Ledger handles and the payload codec for ledger entries
//! - The error taxonomy with its stable numeric codes

pub mod error;
pub mod ledger;
pub mod messages;
pub mod roster;
pub mod round;

pub use error::{BeaconError, ErrorCode};
pub use ledger::{BlockPayload, GenesisRecord, LedgerEntry, LedgerHandle, HASH_LEN};
pub use messages::{PropagateSetup, RandReply, RandRequest, SetupReply, SetupRequest};
pub use roster::{ClusterTopology, Member, Roster};
pub use round::{RandomnessRecord, RoundConfig, Transcript};

/// Name the beacon registers under on every node
pub const SERVICE_NAME: &str = "RandHound";
