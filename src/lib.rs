//! Bridge to the `qcparser` detection and conversion engine.
//!
//! The engine is an external binary speaking JSON over pipes: `detect`
//! prints a single report on stdout, `convert` streams newline-delimited
//! progress events while writing a DJSON artifact to disk. [`EngineBridge`]
//! wraps both invocations; [`DataSession`] loads a finished artifact into an
//! in-memory SQLite table for querying.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::use_cases::engine_bridge::{EngineBridge, ProgressCallback};
pub use domain::entities::{
    Column, ColumnType, ConvertEvent, ConvertSummary, DelimiterGuess, DetectOptions, DetectReport,
    FileFormat, Issue, Preview, SampleStats,
};
pub use domain::error::{BridgeError, Result};
pub use infrastructure::engine::{Engine, SubprocessEngine};
pub use infrastructure::process::{CapturedOutput, StreamedExit};
pub use infrastructure::store::{ColumnMeta, DataSession, QueryResult};
pub use shared::cancel::{CancelHandle, CancelToken};
