//! Query Responder - point and historical randomness requests

use crate::service::BeaconService;
use beacon_types::{BeaconError, RandReply, RandRequest};

impl BeaconService {
    /// Randomness at `request.index`, or the latest when the index is 0
    pub async fn random(&self, request: RandRequest) -> Result<RandReply, BeaconError> {
        let state = self.core.state.lock().await;
        if !state.configured {
            return Err(BeaconError::NotConfigured);
        }

        let index = u64::try_from(request.index)
            .map_err(|_| BeaconError::invalid(format!("negative index {}", request.index)))?;

        let record = self.core.publisher.fetch(&state, index).await?;
        tracing::debug!(
            "Got random-request for index {} and will send index {}",
            request.index,
            record.round_index
        );
        Ok(record.into())
    }
}
