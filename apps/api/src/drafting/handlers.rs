use axum::{extract::State, Json};

use crate::drafting::{draft_sections, DraftRequest, DraftResponse};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/reports/draft
///
/// Drafts report sections for a training task. The returned `sections`
/// object can be posted as-is to `/api/v1/templates/:id/apply`.
pub async fn handle_draft(
    State(state): State<AppState>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<DraftResponse>, AppError> {
    let response = draft_sections(&state.llm, &request).await?;
    Ok(Json(response))
}
