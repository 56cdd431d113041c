use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;

/// Which stage produced an error.
///
/// Load-phase errors mean the process cannot serve anything; request-phase errors are scoped
/// to a single lookup.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    Load,
    Request,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub phase: ErrorPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecommendRequest {
    pub title: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recommendation {
    pub rank: usize,
    pub index: usize,
    pub title: String,
    pub media_ref: String,
    pub score: f32,
}

/// A candidate dropped from the ranking because its index points outside the catalog.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub candidate: usize,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecommendResponse {
    pub schema_version: u32,
    pub status: ResponseStatus,
    pub selected: String,
    pub k: usize,
    #[serde(default)]
    pub items: Vec<Recommendation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
}

impl RecommendResponse {
    #[must_use]
    pub fn ok(
        selected: String,
        k: usize,
        items: Vec<Recommendation>,
        skipped: Vec<SkippedCandidate>,
    ) -> Self {
        Self {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            status: ResponseStatus::Ok,
            selected,
            k,
            items,
            skipped,
            error: None,
        }
    }

    #[must_use]
    pub fn error(selected: String, k: usize, error: ErrorEnvelope) -> Self {
        Self {
            schema_version: PROTOCOL_SCHEMA_VERSION,
            status: ResponseStatus::Error,
            selected,
            k,
            items: Vec::new(),
            skipped: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TitlesResponse {
    pub schema_version: u32,
    pub titles: Vec<String>,
}

/// Shape of a loaded store, reported by `check` and `/health`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub catalog_len: usize,
    pub similarity_layout: String,
    pub similarity_rows: usize,
    pub duplicate_titles: usize,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
