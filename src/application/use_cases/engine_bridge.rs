//! Facade over the external `qcparser` engine.
//!
//! `detect` runs one buffered invocation and decodes the report from stdout;
//! `convert` runs one streaming invocation, surfacing each decoded event
//! through an optional callback and returning the final summary.

use crate::domain::entities::{
    ConvertEvent, ConvertSummary, DetectOptions, DetectReport, EngineErrorEnvelope,
};
use crate::domain::error::{BridgeError, Result};
use crate::infrastructure::engine::{Engine, SubprocessEngine};
use crate::infrastructure::ndjson::{decode_line, LineDecoder};
use crate::shared::cancel::CancelToken;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stands in for an engine failure that produced no stderr at all.
const UNKNOWN_ENGINE_ERROR: &str = "unknown engine error";

/// Invoked once per decoded convert event, in arrival order, on the caller's
/// task. The terminal `result` event is delivered here too.
pub type ProgressCallback<'a> = Box<dyn FnMut(&ConvertEvent) + Send + 'a>;

pub struct EngineBridge {
    engine: Arc<dyn Engine + Send + Sync>,
}

impl EngineBridge {
    pub fn new(engine: Arc<dyn Engine + Send + Sync>) -> Self {
        Self { engine }
    }

    /// Bridge over a subprocess engine at an explicit binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(SubprocessEngine::new(binary)))
    }

    /// Bridge over a subprocess engine located through the discovery chain.
    pub fn discover() -> Self {
        Self::new(Arc::new(SubprocessEngine::discover()))
    }

    /// Inspect a file without converting it.
    ///
    /// Exit 0 with a decodable report is the only success; exit 0 with
    /// undecodable stdout is a protocol violation, and any other exit is
    /// translated from stderr.
    pub async fn detect(&self, file: &Path, options: &DetectOptions) -> Result<DetectReport> {
        tracing::info!("Detecting format of {}", file.display());
        let output = self.engine.detect(file, options).await?;
        if output.code == Some(0) {
            return serde_json::from_str(&output.stdout).map_err(|e| {
                BridgeError::ProtocolViolation(format!("undecodable detect report: {}", e))
            });
        }
        Err(engine_failure(&output.stderr, output.code))
    }

    /// Convert `input` into a DJSON artifact at `output`.
    ///
    /// Succeeds only when the engine exits 0 *and* emitted a `result` event;
    /// a clean exit without one is a protocol violation. Cancellation kills
    /// the engine and surfaces as `BridgeError::Cancelled`.
    pub async fn convert(
        &self,
        input: &Path,
        output: &Path,
        mut on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<CancelToken>,
    ) -> Result<ConvertSummary> {
        tracing::info!("Converting {} -> {}", input.display(), output.display());
        let mut decoder = LineDecoder::new();
        let mut summary: Option<ConvertSummary> = None;

        let exit = {
            let mut sink = |chunk: &[u8]| {
                for line in decoder.feed(chunk) {
                    handle_event(&line, &mut summary, &mut on_progress);
                }
            };
            self.engine.convert(input, output, &mut sink, cancel).await?
        };
        if let Some(line) = decoder.take_remainder() {
            handle_event(&line, &mut summary, &mut on_progress);
        }

        match (exit.code, summary) {
            (Some(0), Some(summary)) => {
                tracing::info!(
                    "Conversion finished: {} rows, {} bytes",
                    summary.rows_written,
                    summary.bytes_written
                );
                Ok(summary)
            }
            (Some(0), None) => Err(BridgeError::ProtocolViolation(
                "conversion exited cleanly without a result event".to_string(),
            )),
            (code, _) => Err(engine_failure(&exit.stderr, code)),
        }
    }
}

fn handle_event(
    line: &str,
    summary: &mut Option<ConvertSummary>,
    on_progress: &mut Option<ProgressCallback<'_>>,
) {
    let Some(event) = decode_line::<ConvertEvent>(line) else {
        return;
    };
    if let Some(cb) = on_progress {
        cb(&event);
    }
    if let ConvertEvent::Result(s) = event {
        if summary.is_some() {
            tracing::warn!("Engine emitted more than one result event, keeping the last");
        }
        *summary = Some(s);
    }
}

/// Translate a failed invocation's stderr into a structured error. A single
/// JSON error envelope is the expected shape; anything else passes through
/// as the raw message.
fn engine_failure(stderr: &str, exit: Option<i32>) -> BridgeError {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return BridgeError::EngineFailure {
            code: None,
            message: UNKNOWN_ENGINE_ERROR.to_string(),
            details: None,
            exit,
        };
    }
    match serde_json::from_str::<EngineErrorEnvelope>(trimmed) {
        Ok(envelope) => BridgeError::EngineFailure {
            code: Some(envelope.error.code),
            message: envelope.error.message,
            details: envelope.error.details,
            exit,
        },
        Err(_) => BridgeError::EngineFailure {
            code: None,
            message: trimmed.to_string(),
            details: None,
            exit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::FileFormat;
    use crate::infrastructure::process::{CapturedOutput, StreamedExit};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ConvertScript {
        chunks: Vec<Vec<u8>>,
        exit: Result<StreamedExit>,
    }

    #[derive(Default)]
    struct FakeEngine {
        detect: Mutex<Option<CapturedOutput>>,
        convert: Mutex<Option<ConvertScript>>,
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn detect(&self, _file: &Path, _options: &DetectOptions) -> Result<CapturedOutput> {
            Ok(self.detect.lock().unwrap().take().unwrap())
        }

        async fn convert(
            &self,
            _input: &Path,
            _output: &Path,
            on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
            _cancel: Option<CancelToken>,
        ) -> Result<StreamedExit> {
            let script = self.convert.lock().unwrap().take().unwrap();
            for chunk in &script.chunks {
                on_chunk(chunk);
            }
            script.exit
        }
    }

    fn detect_bridge(stdout: &str, stderr: &str, code: i32) -> EngineBridge {
        EngineBridge::new(Arc::new(FakeEngine {
            detect: Mutex::new(Some(CapturedOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                code: Some(code),
            })),
            ..Default::default()
        }))
    }

    fn convert_bridge(chunks: Vec<Vec<u8>>, stderr: &str, code: Option<i32>) -> EngineBridge {
        EngineBridge::new(Arc::new(FakeEngine {
            convert: Mutex::new(Some(ConvertScript {
                chunks,
                exit: Ok(StreamedExit {
                    stderr: stderr.to_string(),
                    code,
                }),
            })),
            ..Default::default()
        }))
    }

    fn stream_of(lines: &[&str]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for line in lines {
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
        }
        bytes
    }

    const REPORT: &str = r#"{
        "format": "csv",
        "encoding": "utf-8",
        "delimiter": {"delimiter": ",", "confidence_pct": 98.5},
        "has_header": true,
        "field_count": 3,
        "trim_fields": false,
        "columns": [
            {"name": "id", "type": "INT"},
            {"name": "name", "type": "TEXT"},
            {"name": "score", "type": "DOUBLE"}
        ],
        "preview": {
            "rows": 2,
            "data": [
                {"id": "1", "name": "a", "score": "0.5"},
                {"id": "2", "name": "b", "score": "1.5"}
            ],
            "invalid_rows": 0
        },
        "confidence": 0.97,
        "issues": null,
        "sampled": {"lines": 100, "bytes": 4096, "duration_ms": 3},
        "duration_ms": 5
    }"#;

    const RESULT_LINE: &str = r#"{"type":"result","djson_path":"/tmp/out.djson","rows_written":10000,"bytes_written":1048576,"duration_ms":250}"#;

    fn expected_summary() -> ConvertSummary {
        ConvertSummary {
            djson_path: "/tmp/out.djson".to_string(),
            rows_written: 10000,
            bytes_written: 1048576,
            duration_ms: 250,
            errors: None,
        }
    }

    #[tokio::test]
    async fn test_detect_decodes_report() {
        let bridge = detect_bridge(REPORT, "", 0);
        let report = bridge
            .detect(Path::new("/data/in.csv"), &DetectOptions::default())
            .await
            .unwrap();
        assert_eq!(report.format, FileFormat::Csv);
        assert!(report.has_header);
        assert_eq!(report.field_count, 3);
        assert_eq!(report.columns.len(), 3);
        assert_eq!(report.columns[1].name, "name");
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_detect_garbage_stdout_is_protocol_violation() {
        let bridge = detect_bridge("this is not json", "", 0);
        let err = bridge
            .detect(Path::new("/data/in.csv"), &DetectOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_detect_failure_decodes_error_envelope() {
        let stderr = r#"{"error":{"code":"FILE_NOT_FOUND","message":"File not found: in.csv","details":{"file":"in.csv"}}}"#;
        let bridge = detect_bridge("", stderr, 2);
        let err = bridge
            .detect(Path::new("/data/in.csv"), &DetectOptions::default())
            .await
            .unwrap_err();
        match err {
            BridgeError::EngineFailure {
                code,
                message,
                details,
                exit,
            } => {
                assert_eq!(code.as_deref(), Some("FILE_NOT_FOUND"));
                assert_eq!(message, "File not found: in.csv");
                assert_eq!(details.unwrap()["file"], "in.csv");
                assert_eq!(exit, Some(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_failure_raw_stderr_passes_through() {
        let bridge = detect_bridge("", "panic: everything is on fire\n", 1);
        let err = bridge
            .detect(Path::new("/data/in.csv"), &DetectOptions::default())
            .await
            .unwrap_err();
        match err {
            BridgeError::EngineFailure { code, message, .. } => {
                assert_eq!(code, None);
                assert_eq!(message, "panic: everything is on fire");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_failure_empty_stderr_gets_placeholder() {
        let bridge = detect_bridge("", "  \n", 1);
        let err = bridge
            .detect(Path::new("/data/in.csv"), &DetectOptions::default())
            .await
            .unwrap_err();
        match err {
            BridgeError::EngineFailure { message, exit, .. } => {
                assert_eq!(message, UNKNOWN_ENGINE_ERROR);
                assert_eq!(exit, Some(1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_convert_delivers_events_in_order() {
        let lines = [
            r#"{"type":"started","input_path":"/data/in.csv","output_path":"/tmp/out.djson"}"#,
            r#"{"type":"progress","rows_processed":5000,"percent":50.0}"#,
            r#"{"type":"warning","message":"short row padded","line":12}"#,
            RESULT_LINE,
        ];
        let bridge = convert_bridge(vec![stream_of(&lines)], "", Some(0));

        let mut events: Vec<ConvertEvent> = Vec::new();
        let summary = bridge
            .convert(
                Path::new("/data/in.csv"),
                Path::new("/tmp/out.djson"),
                Some(Box::new(|e| events.push(e.clone()))),
                None,
            )
            .await
            .unwrap();

        assert_eq!(summary, expected_summary());
        assert_eq!(
            events,
            vec![
                ConvertEvent::Started {
                    input_path: "/data/in.csv".to_string(),
                    output_path: "/tmp/out.djson".to_string(),
                },
                ConvertEvent::Progress {
                    rows_processed: Some(5000),
                    percent: Some(50.0),
                },
                ConvertEvent::Warning {
                    message: "short row padded".to_string(),
                    line: Some(12),
                },
                ConvertEvent::Result(expected_summary()),
            ]
        );
    }

    #[tokio::test]
    async fn test_convert_reassembles_lines_split_across_chunks() {
        let bytes = stream_of(&[
            r#"{"type":"progress","rows_processed":100}"#,
            RESULT_LINE,
        ]);
        let chunks = vec![
            bytes[..10].to_vec(),
            bytes[10..23].to_vec(),
            bytes[23..].to_vec(),
        ];
        let bridge = convert_bridge(chunks, "", Some(0));

        let mut count = 0usize;
        let summary = bridge
            .convert(
                Path::new("/in"),
                Path::new("/out"),
                Some(Box::new(|_| count += 1)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(summary, expected_summary());
    }

    #[tokio::test]
    async fn test_convert_skips_malformed_lines() {
        crate::shared::init_test_logging();
        let lines = [
            r#"{"type":"progress","rows_processed":1}"#,
            "not an event at all",
            r#"{"type":"mystery","weird":true}"#,
            RESULT_LINE,
        ];
        let bridge = convert_bridge(vec![stream_of(&lines)], "", Some(0));

        let mut events: Vec<ConvertEvent> = Vec::new();
        let summary = bridge
            .convert(
                Path::new("/in"),
                Path::new("/out"),
                Some(Box::new(|e| events.push(e.clone()))),
                None,
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(summary, expected_summary());
    }

    #[tokio::test]
    async fn test_convert_result_on_final_unterminated_line() {
        // Result line with no trailing newline before the stream closes.
        let mut bytes = stream_of(&[r#"{"type":"progress","rows_processed":1}"#]);
        bytes.extend_from_slice(RESULT_LINE.as_bytes());
        let bridge = convert_bridge(vec![bytes], "", Some(0));

        let summary = bridge
            .convert(Path::new("/in"), Path::new("/out"), None, None)
            .await
            .unwrap();
        assert_eq!(summary, expected_summary());
    }

    #[tokio::test]
    async fn test_convert_clean_exit_without_result_is_protocol_violation() {
        let lines = [r#"{"type":"progress","rows_processed":42}"#];
        let bridge = convert_bridge(vec![stream_of(&lines)], "", Some(0));
        let err = bridge
            .convert(Path::new("/in"), Path::new("/out"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_convert_nonzero_exit_fails_even_with_result_event() {
        let stderr = r#"{"error":{"code":"WRITE_FAILED","message":"disk full"}}"#;
        let bridge = convert_bridge(vec![stream_of(&[RESULT_LINE])], stderr, Some(4));
        let err = bridge
            .convert(Path::new("/in"), Path::new("/out"), None, None)
            .await
            .unwrap_err();
        match err {
            BridgeError::EngineFailure { code, exit, .. } => {
                assert_eq!(code.as_deref(), Some("WRITE_FAILED"));
                assert_eq!(exit, Some(4));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_convert_signal_exit_is_engine_failure() {
        let bridge = convert_bridge(vec![], "", None);
        let err = bridge
            .convert(Path::new("/in"), Path::new("/out"), None, None)
            .await
            .unwrap_err();
        match err {
            BridgeError::EngineFailure { message, exit, .. } => {
                assert_eq!(message, UNKNOWN_ENGINE_ERROR);
                assert_eq!(exit, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_convert_cancellation_passes_through() {
        let bridge = EngineBridge::new(Arc::new(FakeEngine {
            convert: Mutex::new(Some(ConvertScript {
                chunks: vec![stream_of(&[r#"{"type":"progress","rows_processed":1}"#])],
                exit: Err(BridgeError::Cancelled),
            })),
            ..Default::default()
        }));
        let err = bridge
            .convert(Path::new("/in"), Path::new("/out"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Cancelled));
    }
}
