// Route table for the Arbiter API

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

/// Full application with state attached
pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes()).with_state(state)
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/execute-code", post(handlers::execute_code))
        .route("/problems/validate", post(handlers::validate_problem))
        .route("/runs/:run_id", get(handlers::get_run))
        .route("/languages", get(handlers::list_languages))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
}
