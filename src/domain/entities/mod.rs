pub mod conversion;
pub mod detection;
pub mod engine_error;

pub use conversion::{ConvertEvent, ConvertSummary};
pub use detection::{
    Column, ColumnType, DelimiterGuess, DetectOptions, DetectReport, FileFormat, Issue, Preview,
    SampleStats,
};
pub use engine_error::{EngineErrorBody, EngineErrorEnvelope};
