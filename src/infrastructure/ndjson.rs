//! Incremental decoding of the engine's newline-delimited JSON stream.

use serde::de::DeserializeOwned;

/// Reassembles complete lines out of raw stdout chunks.
///
/// Chunks may split lines, carry several lines at once, or split a multibyte
/// UTF-8 sequence; buffering is byte-level so none of that matters. One
/// decoder per stream; not reusable across calls.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line completed by it. Trailing `\r` is
    /// stripped and blank lines are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Hand back a final unterminated line once the stream has ended, if any.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        let line = String::from_utf8_lossy(&rest);
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

/// Decode one line as one self-contained JSON message.
///
/// A line that fails to decode is dropped with a diagnostic; the stream is
/// never aborted for it. Pure: the same line always yields the same result.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Option<T> {
    match serde_json::from_str(line) {
        Ok(msg) => Some(msg),
        Err(err) => {
            let shown: String = line.chars().take(200).collect();
            tracing::warn!("Dropping malformed stream line ({}): {}", err, shown);
            None
        }
    }
}
