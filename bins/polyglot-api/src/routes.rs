// Route definitions for the Polyglot API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers, AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run_code))
        .route("/evaluate", post(handlers::evaluate_submission))
        .route("/status", get(handlers::health_check))
        .route("/toolchains", get(handlers::list_toolchains))
}
