use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the store answers, logging the failure when it does not.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}
