//! Subprocess invoker for the engine binary.
//!
//! One OS process per call, stdin closed, stdout/stderr captured as
//! independent pipes. A process that cannot start surfaces as
//! `BridgeError::LaunchFailed`, never as a numeric exit status.

use crate::domain::error::{BridgeError, Result};
use crate::shared::cancel::CancelToken;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

/// Everything a buffered invocation produces, returned atomically on exit.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

/// Exit information from a streaming invocation; stdout has already been
/// delivered chunk by chunk.
#[derive(Debug, Clone)]
pub struct StreamedExit {
    pub stderr: String,
    pub code: Option<i32>,
}

fn engine_command(program: &Path, args: &[OsString]) -> TokioCommand {
    let mut cmd = TokioCommand::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn launch_failure(program: &Path, err: &std::io::Error) -> BridgeError {
    BridgeError::LaunchFailed(format!("failed to launch {}: {}", program.display(), err))
}

/// Run to completion and capture both streams in full. Used by `detect`.
pub async fn run_buffered(program: &Path, args: &[OsString]) -> Result<CapturedOutput> {
    let child = engine_command(program, args)
        .spawn()
        .map_err(|e| launch_failure(program, &e))?;

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| BridgeError::IoError(format!("failed to collect engine output: {}", e)))?;

    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    })
}

/// Run and hand raw stdout chunks to `on_chunk` as they arrive; stderr is
/// buffered in full for post-mortem reporting. Resolves only on process exit,
/// or immediately with `BridgeError::Cancelled` when the token fires (the
/// child is killed and stderr is not drained).
///
/// Chunk boundaries are arbitrary: a chunk may split a line or even a UTF-8
/// sequence, so the sink must reassemble.
pub async fn run_streaming(
    program: &Path,
    args: &[OsString],
    on_chunk: &mut (dyn FnMut(&[u8]) + Send),
    mut cancel: Option<CancelToken>,
) -> Result<StreamedExit> {
    let mut child = engine_command(program, args)
        .spawn()
        .map_err(|e| launch_failure(program, &e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| BridgeError::IoError("engine stdout unavailable".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| BridgeError::IoError("engine stderr unavailable".to_string()))?;

    // Drain stderr on its own task so a chatty engine cannot deadlock on a
    // full pipe while we read stdout.
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    });

    let mut buf = [0u8; 8192];
    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => {
                let n = read.map_err(|e| {
                    BridgeError::IoError(format!("engine stdout read failed: {}", e))
                })?;
                if n == 0 {
                    break;
                }
                on_chunk(&buf[..n]);
            }
            _ = fired(&mut cancel) => {
                tracing::debug!("cancellation requested, killing engine process");
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(BridgeError::Cancelled);
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => {
            status.map_err(|e| BridgeError::IoError(format!("engine wait failed: {}", e)))?
        }
        _ = fired(&mut cancel) => {
            tracing::debug!("cancellation requested while awaiting engine exit");
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(BridgeError::Cancelled);
        }
    };

    let stderr = stderr_task.await.unwrap_or_default();
    Ok(StreamedExit {
        stderr,
        code: status.code(),
    })
}

async fn fired(cancel: &mut Option<CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
