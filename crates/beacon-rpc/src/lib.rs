//! Beacon RPC - JSON-RPC over HTTP for the randomness beacon
//!
//! Methods:
//! - `setup`, `random`: the beacon's client-facing operations
//! - `propagateSetup`: sent between cluster members after setup
//! - `getHealth`, `getStats`, `getVersion`: node introspection
//!
//! [`HttpNotifier`] is the sending side of `propagateSetup`.

pub mod http_server;
pub mod methods;
pub mod notifier;

pub use http_server::HttpRpcServer;
pub use methods::{RpcContext, RpcError};
pub use notifier::HttpNotifier;

