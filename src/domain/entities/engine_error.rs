//! Structured error envelope the engine prints to stderr on failure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// `{"error": {"code", "message", "details"?}}` as emitted by every failing
/// engine command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineErrorEnvelope {
    pub error: EngineErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_decodes_with_details() {
        let envelope: EngineErrorEnvelope = serde_json::from_str(
            r#"{"error":{"code":"FILE_NOT_FOUND","message":"File not found: x.csv",
                "details":{"file":"x.csv"}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.error.code, "FILE_NOT_FOUND");
        assert_eq!(envelope.error.details.unwrap()["file"], "x.csv");
    }

    #[test]
    fn test_envelope_decodes_without_details() {
        let envelope: EngineErrorEnvelope =
            serde_json::from_str(r#"{"error":{"code":"CONVERSION_FAILED","message":"boom"}}"#)
                .unwrap();
        assert_eq!(envelope.error.code, "CONVERSION_FAILED");
        assert!(envelope.error.details.is_none());
    }
}
