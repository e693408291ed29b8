use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::health::HealthAggregator;

pub async fn health_check(State(state): State<AppState>) -> Response {
    let aggregator = HealthAggregator::new(
        state.storage.clone(),
        state.metrics_store.clone(),
        state.cache.clone(),
        &state.config.timeouts,
    );

    match aggregator.check().await {
        Ok(()) => (StatusCode::OK, "Healthy").into_response(),
        Err(error) => {
            tracing::error!(%error, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}
