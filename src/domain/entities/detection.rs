//! Wire types for the engine's `detect` command.
//!
//! Field names follow the engine's JSON output exactly; nothing here is
//! renamed for local taste.

use crate::shared::utils::null_as_default;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input format the engine recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Jsonl,
}

/// Scalar type the engine inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Int,
    Double,
    Timestamp,
    Boolean,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelimiterGuess {
    pub delimiter: String,
    pub confidence_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: ColumnType,
}

/// Sample rows extracted during detection, as raw text fields keyed by
/// column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub rows: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<HashMap<String, String>>,
    pub invalid_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
}

/// How much of the input the engine actually looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleStats {
    pub lines: u64,
    pub bytes: u64,
    pub duration_ms: u64,
}

/// Full detection result, decoded from the engine's stdout.
///
/// Invariant (engine-guaranteed): `columns.len() == field_count`, and preview
/// row keys are a subset of the column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectReport {
    pub format: FileFormat,
    pub encoding: String,
    #[serde(default)]
    pub delimiter: Option<DelimiterGuess>,
    #[serde(default)]
    pub comment: Option<String>,
    pub has_header: bool,
    pub field_count: u32,
    pub trim_fields: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<Column>,
    pub preview: Preview,
    pub confidence: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
    pub sampled: SampleStats,
    pub duration_ms: u64,
}

/// Options for `detect`. Unset fields are omitted from the engine invocation
/// entirely; defaulting is the engine's responsibility.
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    /// Cap on how many input bytes the engine samples.
    pub sample_bytes: Option<u64>,
    /// Cap on how many preview rows the engine returns.
    pub max_preview_rows: Option<u32>,
}
