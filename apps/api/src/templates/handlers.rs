use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::docx;
use crate::errors::AppError;
use crate::merge::engine::discover_placeholders;
use crate::merge::{merge, ReplacementMap};
use crate::models::template::TemplateRow;
use crate::state::AppState;
use crate::templates::repository::{self, NewTemplate};
use crate::templates::store::{content_key, TemplateStore};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Uuid,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct PlaceholdersResponse {
    pub template_id: Uuid,
    pub placeholders: Vec<String>,
}

/// POST /api/v1/templates
///
/// Multipart fields: `file` (the .docx), `name`, `user_id`.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut name: Option<String> = None;
    let mut user_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                file = Some((filename, data));
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read name: {e}")))?;
                name = Some(text);
            }
            Some("user_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read user_id: {e}")))?;
                let parsed = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::Validation(format!("user_id is not a UUID: '{text}'")))?;
                user_id = Some(parsed);
            }
            _ => {}
        }
    }

    let (filename, data) = file.ok_or_else(|| AppError::Validation("file field is required".to_string()))?;
    let user_id = user_id.ok_or_else(|| AppError::Validation("user_id field is required".to_string()))?;
    check_upload(&filename, &data)?;

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_template_name(&filename));

    // Parse once up front so a broken file is refused at upload, not at apply.
    let parse_input = data.clone();
    let placeholders = tokio::task::spawn_blocking(move || {
        docx::load(&parse_input).map(|doc| discover_placeholders(&doc).into_iter().collect::<Vec<_>>())
    })
    .await
    .context("template parse task failed")?
    .map_err(|e| AppError::TemplateLoad(e.to_string()))?;

    // Identical uploads share a blob; writers of one key are serialized so a
    // concurrent delete cannot remove the blob under a new row.
    let storage_key = content_key(&data);
    let mut tx = state.db.begin().await?;
    repository::lock_storage_key(&mut *tx, &storage_key).await?;
    let existing = repository::count_by_storage_key(&mut *tx, &storage_key).await?;

    state.store.put(&data).await?;

    let inserted = repository::insert_template(
        &mut *tx,
        &NewTemplate {
            user_id,
            name: &name,
            original_filename: &filename,
            storage_key: &storage_key,
            size_bytes: data.len() as i64,
            placeholders: &placeholders,
        },
    )
    .await;
    let row = match inserted {
        Ok(row) => row,
        Err(e) => {
            discard_unreferenced_blob(state.store.as_ref(), &storage_key, existing).await;
            return Err(e.into());
        }
    };
    tx.commit().await?;

    info!(
        "Template {} uploaded by {user_id}: {} placeholder(s), key {storage_key}",
        row.id,
        row.placeholders.len()
    );
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/templates
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<TemplateRow>>, AppError> {
    let (skip, limit) = page_bounds(params.skip, params.limit)?;
    let rows = repository::list_templates(&state.db, params.user_id, skip, limit).await?;
    Ok(Json(rows))
}

/// GET /api/v1/templates/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<TemplateRow>, AppError> {
    let row = find_template(&state, id, params.user_id).await?;
    Ok(Json(row))
}

/// GET /api/v1/templates/:id/placeholders
///
/// Re-reads the stored file rather than trusting the recorded list.
pub async fn handle_placeholders(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PlaceholdersResponse>, AppError> {
    let row = find_template(&state, id, params.user_id).await?;
    let data = state.store.get(&row.storage_key).await?;

    let placeholders = tokio::task::spawn_blocking(move || {
        docx::load(&data).map(|doc| discover_placeholders(&doc).into_iter().collect::<Vec<_>>())
    })
    .await
    .context("template parse task failed")?
    .map_err(|e| AppError::TemplateLoad(e.to_string()))?;

    Ok(Json(PlaceholdersResponse {
        template_id: id,
        placeholders,
    }))
}

/// POST /api/v1/templates/:id/apply
///
/// Body: `{"<placeholder>": "<text>", ...}`. Responds with the merged .docx.
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(replacements): Json<ReplacementMap>,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let row = find_template(&state, id, params.user_id).await?;
    let data = state.store.get(&row.storage_key).await?;

    let result = tokio::task::spawn_blocking(move || merge(&data, &replacements))
        .await
        .context("merge task failed")??;

    info!(
        "Applied template {id}: {} replacement(s), {} placeholder(s) found",
        result.replacements_applied,
        result.placeholders_found.len()
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DOCX_CONTENT_TYPE));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            report_filename(id, Utc::now())
        ))
        .context("invalid Content-Disposition value")?,
    );
    headers.insert("x-replacements-applied", HeaderValue::from(result.replacements_applied));

    Ok((headers, result.document))
}

/// DELETE /api/v1/templates/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let mut tx = state.db.begin().await?;
    let row = repository::delete_template(&mut *tx, id, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))?;

    // Blobs are shared between identical uploads.
    repository::lock_storage_key(&mut *tx, &row.storage_key).await?;
    let remaining = repository::count_by_storage_key(&mut *tx, &row.storage_key).await?;
    discard_unreferenced_blob(state.store.as_ref(), &row.storage_key, remaining).await;
    tx.commit().await?;

    info!("Template {id} deleted ({remaining} other reference(s) to its blob)");
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the blob when no row references it. Returns whether it was removed;
/// storage failures are logged and leave the blob in place.
async fn discard_unreferenced_blob(store: &dyn TemplateStore, key: &str, references: i64) -> bool {
    if references > 0 {
        return false;
    }
    match store.delete(key).await {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to delete template blob {key}: {e}");
            false
        }
    }
}

async fn find_template(state: &AppState, id: Uuid, user_id: Uuid) -> Result<TemplateRow, AppError> {
    repository::get_template(&state.db, id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))
}

fn check_upload(filename: &str, data: &[u8]) -> Result<(), AppError> {
    if !filename.to_ascii_lowercase().ends_with(".docx") {
        return Err(AppError::Validation(format!(
            "Only .docx templates are supported, got '{filename}'"
        )));
    }
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    Ok(())
}

fn default_template_name(filename: &str) -> String {
    let stem = &filename[..filename.len().saturating_sub(".docx".len())];
    if stem.trim().is_empty() {
        "Untitled template".to_string()
    } else {
        stem.trim().to_string()
    }
}

fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> Result<(i64, i64), AppError> {
    let skip = skip.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if skip < 0 {
        return Err(AppError::Validation("skip must be >= 0".to_string()));
    }
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}"
        )));
    }
    Ok((skip, limit))
}

/// `report_<id>_<YYYYmmddHHMMSS>.docx`
fn report_filename(id: Uuid, at: DateTime<Utc>) -> String {
    format!("report_{id}_{}.docx", at.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::store::{LocalTemplateStore, StoreError};
    use chrono::TimeZone;

    #[test]
    fn test_check_upload() {
        assert!(check_upload("report.docx", b"PK").is_ok());
        assert!(check_upload("REPORT.DOCX", b"PK").is_ok());
        assert!(matches!(check_upload("report.doc", b"PK"), Err(AppError::Validation(_))));
        assert!(matches!(check_upload("report.pdf", b"PK"), Err(AppError::Validation(_))));
        assert!(matches!(check_upload("report.docx", b""), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_default_template_name() {
        assert_eq!(default_template_name("Lab report.docx"), "Lab report");
        assert_eq!(default_template_name(".docx"), "Untitled template");
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None).unwrap(), (0, 100));
        assert_eq!(page_bounds(Some(20), Some(10)).unwrap(), (20, 10));
        assert!(page_bounds(Some(-1), None).is_err());
        assert!(page_bounds(None, Some(0)).is_err());
        assert!(page_bounds(None, Some(MAX_LIST_LIMIT + 1)).is_err());
    }

    #[tokio::test]
    async fn test_unreferenced_blob_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path()).await.unwrap();
        let key = store.put(b"template").await.unwrap();

        assert!(discard_unreferenced_blob(&store, &key, 0).await);
        assert!(matches!(store.get(&key).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_shared_blob_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path()).await.unwrap();
        let key = store.put(b"template").await.unwrap();

        assert!(!discard_unreferenced_blob(&store, &key, 1).await);
        assert_eq!(store.get(&key).await.unwrap(), b"template");
    }

    #[tokio::test]
    async fn test_discard_failure_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTemplateStore::new(dir.path()).await.unwrap();
        assert!(!discard_unreferenced_blob(&store, "not-a-key", 0).await);
    }

    #[test]
    fn test_report_filename() {
        let id = Uuid::nil();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            report_filename(id, at),
            "report_00000000-0000-0000-0000-000000000000_20240309140507.docx"
        );
    }
}
