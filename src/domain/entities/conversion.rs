//! Wire types for the engine's streaming `convert` command.

use serde::{Deserialize, Serialize};

/// Terminal payload of a successful conversion, carried by the `result` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertSummary {
    pub djson_path: String,
    pub rows_written: u64,
    pub bytes_written: u64,
    pub duration_ms: u64,
    /// Per-row error messages accumulated during conversion. Rows that failed
    /// to parse are skipped by the engine, not fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// One newline-delimited event on the engine's stdout during `convert`.
///
/// A well-formed stream is any number of `started`/`progress`/`warning`
/// events terminated by exactly one `result` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConvertEvent {
    #[serde(rename = "started")]
    Started {
        input_path: String,
        output_path: String,
    },
    #[serde(rename = "progress")]
    Progress {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows_processed: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<f64>,
    },
    #[serde(rename = "warning")]
    Warning {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u64>,
    },
    #[serde(rename = "result")]
    Result(ConvertSummary),
}
