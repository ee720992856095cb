//! Cluster notification
//!
//! After setup every roster member is told that the beacon is configured.
//! Delivery is at-most-once with no acknowledgment: implementations must
//! return immediately and swallow per-recipient failures. This marks members
//! as taken but does not stop them from joining another beacon.

use beacon_types::{Member, PropagateSetup};

/// Fire-and-forget notifier
pub trait ClusterNotifier: Send + Sync {
    fn notify(&self, member: &Member, message: PropagateSetup);
}

/// Notifier for single-node deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ClusterNotifier for NoopNotifier {
    fn notify(&self, member: &Member, _message: PropagateSetup) {
        tracing::trace!("Skipping setup propagation to {}", member.id);
    }
}
