//! HTTP Notifier - sends `propagateSetup` to cluster members
//!
//! Each notification is a spawned JSON-RPC POST. Nothing waits for it and
//! delivery failures are only logged.

use beacon_runtime::ClusterNotifier;
use beacon_types::{Member, PropagateSetup};
use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpNotifier {
    client: Client,
    next_id: AtomicU64,
}

impl HttpNotifier {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }

    /// RPC endpoint of a member given as `host:port` or a full URL
    pub fn endpoint(address: &str) -> String {
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}/", address)
        }
    }
}

impl ClusterNotifier for HttpNotifier {
    fn notify(&self, member: &Member, message: PropagateSetup) {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "propagateSetup",
            "params": message,
        });
        let url = Self::endpoint(&member.address);
        let member_id = member.id.clone();
        let client = self.client.clone();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, dropping setup propagation to {}", member_id);
            return;
        };

        runtime.spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("Propagated setup to {} ({})", member_id, url);
                }
                Ok(resp) => {
                    tracing::debug!("Couldn't propagate setup to {}: HTTP {}", member_id, resp.status());
                }
                Err(e) => {
                    tracing::debug!("Couldn't propagate setup to {}: {}", member_id, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpRpcServer, RpcContext};
    use beacon_runtime::{BeaconService, LocalRoundProtocol};
    use std::sync::Arc;

    #[test]
    fn test_endpoint() {
        assert_eq!(HttpNotifier::endpoint("10.0.0.1:7770"), "http://10.0.0.1:7770/");
        assert_eq!(HttpNotifier::endpoint("https://beacon.example/rpc"), "https://beacon.example/rpc");
    }

    #[test]
    fn test_notify_without_runtime_is_dropped() {
        let notifier = HttpNotifier::new().unwrap();
        notifier.notify(&Member::new("a", "127.0.0.1:1"), PropagateSetup::default());
    }

    #[tokio::test]
    async fn test_unreachable_member_is_ignored() {
        let notifier = HttpNotifier::new().unwrap();
        // Port 1 on loopback refuses connections
        notifier.notify(&Member::new("gone", "127.0.0.1:1"), PropagateSetup::default());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_propagation_reaches_member() {
        let member = BeaconService::builder(Arc::new(LocalRoundProtocol::new())).build();
        let router = HttpRpcServer::new(Arc::new(RpcContext::new(member.clone()))).router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let notifier = HttpNotifier::new().unwrap();
        notifier.notify(&Member::new("member", addr.to_string()), PropagateSetup::default());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !member.is_configured().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}
