//! HTTP surface: one route per dashboard view.

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{alert::AlertScanner, config::HeatmapConfig, sources::SubmissionSender, store::PulseStore};
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: PulseStore,
    pub submissions: SubmissionSender,
    pub scanner: AlertScanner,
    pub heatmap: Arc<HeatmapConfig>,
    pub recent_limit: usize,
    pub auth_bearer_token: Option<Arc<str>>,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/temples", get(handlers::list_temples))
        .route("/pulse", post(handlers::submit_pulse))
        .route("/temples/:temple/overview", get(handlers::temple_overview))
        .route("/temples/:temple/heatmap", get(handlers::temple_heatmap))
        .route("/temples/:temple/snapshot", get(handlers::pilgrim_snapshot))
        .route("/alerts", get(handlers::crowd_alerts))
        .route("/export", get(handlers::export_records))
        .route("/logs/recent", get(handlers::recent_logs))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
