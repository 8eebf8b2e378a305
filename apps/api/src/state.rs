use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::templates::store::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Template blob storage. Local directory or S3, chosen from config at startup.
    pub store: Arc<dyn TemplateStore>,
    pub llm: LlmClient,
    pub config: Config,
}
