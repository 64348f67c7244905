//! Production engine transport: the `qcparser` binary driven over pipes.

use super::Engine;
use crate::domain::entities::DetectOptions;
use crate::domain::error::Result;
use crate::infrastructure::process::{self, CapturedOutput, StreamedExit};
use crate::shared::cancel::CancelToken;
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

const ENGINE_BINARY: &str = "qcparser";
const ENGINE_BIN_ENV: &str = "QCPARSER_BIN";

pub struct SubprocessEngine {
    binary: PathBuf,
}

impl SubprocessEngine {
    /// Use an explicitly configured engine binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate the engine binary: the `QCPARSER_BIN` environment variable,
    /// then next to the current executable, then the working directory, and
    /// finally the bare name resolved through `PATH` at spawn time.
    pub fn discover() -> Self {
        Self {
            binary: resolve_binary(std::env::var_os(ENGINE_BIN_ENV).map(PathBuf::from)),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl Engine for SubprocessEngine {
    async fn detect(&self, file: &Path, options: &DetectOptions) -> Result<CapturedOutput> {
        let args = detect_args(file, options);
        tracing::debug!("Running engine detect: {:?} {:?}", self.binary, args);
        process::run_buffered(&self.binary, &args).await
    }

    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
        cancel: Option<CancelToken>,
    ) -> Result<StreamedExit> {
        let args = convert_args(input, output);
        tracing::debug!("Running engine convert: {:?} {:?}", self.binary, args);
        process::run_streaming(&self.binary, &args, on_chunk, cancel).await
    }
}

fn binary_name() -> String {
    if cfg!(windows) {
        format!("{}.exe", ENGINE_BINARY)
    } else {
        ENGINE_BINARY.to_string()
    }
}

fn resolve_binary(env_override: Option<PathBuf>) -> PathBuf {
    if let Some(path) = env_override {
        return path;
    }
    let name = binary_name();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(&name);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join(&name);
        if candidate.exists() {
            return candidate;
        }
    }
    PathBuf::from(name)
}

/// `detect --file=<path> [--sample-bytes=<n>] [--max-preview-rows=<n>]`.
/// Unset options are omitted entirely; defaulting is the engine's business.
fn detect_args(file: &Path, options: &DetectOptions) -> Vec<OsString> {
    let mut args = vec![OsString::from("detect"), flag_arg("--file=", file.as_os_str())];
    if let Some(bytes) = options.sample_bytes {
        args.push(OsString::from(format!("--sample-bytes={}", bytes)));
    }
    if let Some(rows) = options.max_preview_rows {
        args.push(OsString::from(format!("--max-preview-rows={}", rows)));
    }
    args
}

/// `convert --input=<path> --output=<path>`.
fn convert_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        OsString::from("convert"),
        flag_arg("--input=", input.as_os_str()),
        flag_arg("--output=", output.as_os_str()),
    ]
}

fn flag_arg(flag: &str, value: &OsStr) -> OsString {
    let mut arg = OsString::from(flag);
    arg.push(value);
    arg
}
