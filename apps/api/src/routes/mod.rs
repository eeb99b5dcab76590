pub mod health;
pub mod summaries;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/topics", get(summaries::handle_list_topics))
        .route(
            "/topics/:id/summary",
            get(summaries::handle_get_summary).delete(summaries::handle_invalidate_summary),
        )
        .route(
            "/topics/:id/summary/refresh",
            post(summaries::handle_refresh_summary),
        )
        .route("/topics/:id/summaries", get(summaries::handle_summary_history))
        .with_state(state)
}
