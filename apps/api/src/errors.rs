use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::merge::MergeError;
use crate::templates::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The stored template is not a readable Word document.
    #[error("Template load error: {0}")]
    TemplateLoad(String),

    /// The merged document could not be written.
    #[error("Template save error: {0}")]
    TemplateSave(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::DocumentLoad(e) => AppError::TemplateLoad(e.to_string()),
            MergeError::DocumentSave(e) => AppError::TemplateSave(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::TemplateLoad(msg) => {
                tracing::warn!("Template load error: {msg}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "TEMPLATE_LOAD_ERROR",
                    "Could not read the template file; it may be corrupt. Re-upload the template."
                        .to_string(),
                )
            }
            AppError::TemplateSave(msg) => {
                tracing::error!("Template save error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "TEMPLATE_SAVE_ERROR",
                    "Could not write the merged document. Retry the request.".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Storage(StoreError::NotFound(key)) => {
                tracing::error!("Template blob missing from storage: {key}");
                (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Template file not found".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "The text generation service failed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::DocxError;

    #[test]
    fn test_merge_errors_map_to_distinct_statuses() {
        let load: AppError = MergeError::DocumentLoad(DocxError::MissingPart("word/document.xml".into())).into();
        let save: AppError = MergeError::DocumentSave(DocxError::Io(std::io::Error::other("disk"))).into();

        assert!(matches!(load, AppError::TemplateLoad(_)));
        assert!(matches!(save, AppError::TemplateSave(_)));
        assert_eq!(load.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(save.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let err = AppError::Storage(StoreError::NotFound("abc.docx".into()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
