//! Report drafting, the content provider for template merges.
//!
//! Turns a training task (title + description) into a section-name → text
//! map by asking the LLM for one JSON object. The map is shaped to exactly
//! the requested section names so it can be handed straight to the merge
//! engine as a `ReplacementMap`.

pub mod handlers;
pub mod prompts;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::drafting::prompts::{build_draft_prompt, draft_system};
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::merge::ReplacementMap;

#[derive(Debug, Clone, Deserialize)]
pub struct DraftRequest {
    pub title: String,
    pub description: String,
    /// Section names, usually the placeholders of the target template.
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftResponse {
    pub sections: ReplacementMap,
    /// Requested sections the model left out; they are returned as empty text.
    pub missing: Vec<String>,
}

pub async fn draft_sections(llm: &LlmClient, request: &DraftRequest) -> Result<DraftResponse, AppError> {
    validate(request)?;

    let sections = dedup_sections(&request.sections);
    info!(
        "Drafting {} section(s) for task '{}' with {}",
        sections.len(),
        request.title,
        llm.model()
    );

    let prompt = build_draft_prompt(&request.title, &request.description, &sections);
    let raw: BTreeMap<String, serde_json::Value> = llm
        .complete_json(&prompt, &draft_system())
        .await
        .map_err(|e| AppError::Llm(format!("Failed to draft report sections: {e}")))?;

    Ok(shape_sections(&sections, raw))
}

fn validate(request: &DraftRequest) -> Result<(), AppError> {
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    if request.description.trim().is_empty() {
        return Err(AppError::Validation("description cannot be empty".to_string()));
    }
    if request.sections.iter().all(|s| s.trim().is_empty()) {
        return Err(AppError::Validation(
            "at least one section name is required".to_string(),
        ));
    }
    Ok(())
}

/// Trimmed, non-empty, first occurrence wins.
fn dedup_sections(sections: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    sections
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Keeps exactly the requested keys. Non-string values are rendered as
/// JSON text; absent keys become empty strings and are reported as missing.
fn shape_sections(requested: &[String], mut raw: BTreeMap<String, serde_json::Value>) -> DraftResponse {
    let mut sections = ReplacementMap::new();
    let mut missing = Vec::new();

    for name in requested {
        let text = match raw.remove(name) {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => {
                missing.push(name.clone());
                String::new()
            }
            Some(other) => other.to_string(),
        };
        sections.insert(name.clone(), text);
    }

    if !raw.is_empty() {
        warn!(
            "Dropping {} unrequested section(s) from model output: {:?}",
            raw.len(),
            raw.keys().collect::<Vec<_>>()
        );
    }
    if !missing.is_empty() {
        warn!("Model omitted section(s): {:?}", missing);
    }

    DraftResponse { sections, missing }
}
