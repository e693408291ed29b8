//! Route surface. The legacy camelCase routes and the versioned
//! snake_case ones are backed by the same pipeline.

mod health;
mod report_status;
mod update_check;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/healthcheck", get(health::health_check))
        .route("/updateCheck", get(update_check::update_check_legacy))
        .route(
            "/v0.1/public/codepush/update_check",
            get(update_check::update_check_versioned),
        )
        .route("/reportStatus/deploy", post(report_status::report_status_deploy))
        .route(
            "/v0.1/public/codepush/report_status/deploy",
            post(report_status::report_status_deploy),
        )
        .route(
            "/reportStatus/download",
            post(report_status::report_status_download),
        )
        .route(
            "/v0.1/public/codepush/report_status/download",
            post(report_status::report_status_download),
        )
        .with_state(state)
}

async fn greeting() -> &'static str {
    "Welcome to the Updraft acquisition API!"
}
