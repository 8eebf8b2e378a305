pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::drafting::handlers as drafting;
use crate::state::AppState;
use crate::templates::handlers as templates;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_template_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Templates
        .route(
            "/api/v1/templates",
            get(templates::handle_list).post(templates::handle_upload),
        )
        .route(
            "/api/v1/templates/:id",
            get(templates::handle_get).delete(templates::handle_delete),
        )
        .route(
            "/api/v1/templates/:id/placeholders",
            get(templates::handle_placeholders),
        )
        .route("/api/v1/templates/:id/apply", post(templates::handle_apply))
        // Report drafting
        .route("/api/v1/reports/draft", post(drafting::handle_draft))
        .layer(body_limit)
        .with_state(state)
}
