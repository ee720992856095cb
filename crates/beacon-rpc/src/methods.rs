//! RPC Methods - JSON-RPC method handlers
//!
//! Thin wrappers over [`BeaconService`]. Byte fields go over the wire as
//! base64 strings.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use beacon_runtime::{BeaconService, RoundStats};
use beacon_types::{BeaconError, PropagateSetup, RandReply, RandRequest, SetupReply, SetupRequest};
use serde::{Deserialize, Serialize};

/// RPC context shared across handlers
pub struct RpcContext {
    pub service: BeaconService,
}

impl RpcContext {
    pub fn new(service: BeaconService) -> Self {
        Self { service }
    }
}

// ============ Request/Response Types ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomResponse {
    /// Base64 encoded
    pub value: String,
    /// Base64 encoded
    pub transcript: String,
    pub index: u64,
}

impl From<RandReply> for RandomResponse {
    fn from(reply: RandReply) -> Self {
        Self {
            value: BASE64.encode(&reply.value),
            transcript: BASE64.encode(reply.transcript.as_bytes()),
            index: reply.index,
        }
    }
}

impl RandomResponse {
    /// Decode back into raw bytes
    pub fn decode(&self) -> Result<(Vec<u8>, Vec<u8>), RpcError> {
        let value = BASE64
            .decode(&self.value)
            .map_err(|_| RpcError::InvalidParams("Invalid base64 value".to_string()))?;
        let transcript = BASE64
            .decode(&self.transcript)
            .map_err(|_| RpcError::InvalidParams("Invalid base64 transcript".to_string()))?;
        Ok((value, transcript))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub storage: &'static str,
    pub scheduling: bool,
    #[serde(flatten)]
    pub rounds: RoundStats,
}

// ============ RPC Handlers ============

/// Handle setup RPC method
pub async fn handle_setup(ctx: &RpcContext, request: SetupRequest) -> Result<SetupReply, RpcError> {
    Ok(ctx.service.setup(request).await?)
}

/// Handle random RPC method
pub async fn handle_random(ctx: &RpcContext, request: RandRequest) -> Result<RandomResponse, RpcError> {
    let reply = ctx.service.random(request).await?;
    Ok(reply.into())
}

/// Handle propagateSetup RPC method
pub async fn handle_propagate(ctx: &RpcContext, message: PropagateSetup) -> Result<(), RpcError> {
    ctx.service.handle_propagate(message).await;
    Ok(())
}

/// Handle getStats RPC method
pub fn handle_get_stats(ctx: &RpcContext) -> Result<StatsResponse, RpcError> {
    Ok(StatsResponse {
        storage: ctx.service.storage_policy(),
        scheduling: ctx.service.is_scheduling(),
        rounds: ctx.service.stats(),
    })
}

/// Handle getHealth RPC method
pub fn handle_get_health() -> Result<String, RpcError> {
    Ok("ok".to_string())
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error(transparent)]
    Beacon(#[from] BeaconError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::Transcript;

    #[test]
    fn test_random_response_is_base64() {
        let response = RandomResponse::from(RandReply {
            value: vec![0xff, 0x00, 0x10],
            transcript: Transcript(b"transcript".to_vec()),
            index: 7,
        });

        assert_eq!(response.value, "/wAQ");
        assert_eq!(response.index, 7);

        let (value, transcript) = response.decode().unwrap();
        assert_eq!(value, vec![0xff, 0x00, 0x10]);
        assert_eq!(transcript, b"transcript".to_vec());
    }

    #[test]
    fn test_bad_base64_is_invalid_params() {
        let response = RandomResponse {
            value: "***".to_string(),
            transcript: String::new(),
            index: 1,
        };
        assert!(matches!(response.decode(), Err(RpcError::InvalidParams(_))));
    }
}
