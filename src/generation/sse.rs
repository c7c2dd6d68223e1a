//! Incremental server-sent-events decoder
//!
//! Network chunks do not respect line boundaries, so bytes are buffered
//! until a full line is available. Only `data:` fields are surfaced.
//! - Buffer: 1MB maximum per pending line
//! - Lines: `\n` or `\r\n` terminated

use serde::Deserialize;

use crate::errors::{Result, TutorError};

/// Maximum bytes held for a single unterminated line (1MB)
pub const MAX_LINE_SIZE: usize = 1_048_576;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line_size: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE_SIZE)
    }

    pub fn with_capacity(max_line_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_line_size,
        }
    }

    /// Feed bytes, returning the payload of every completed `data:` line
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_field(&line) {
                payloads.push(data);
            }
        }

        if self.buffer.len() > self.max_line_size {
            return Err(TutorError::StreamingError(format!(
                "Line overflow: {} bytes exceeds maximum {}",
                self.buffer.len(),
                self.max_line_size
            )));
        }

        Ok(payloads)
    }

    /// Flush a trailing line that arrived without a newline
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_field(&line)
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn data_field(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\n', '\r']);
    let data = text.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

/// One streamed event from the text-generation inference API
#[derive(Debug, Deserialize)]
struct StreamEvent {
    token: Option<StreamToken>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamToken {
    text: String,
    #[serde(default)]
    special: bool,
}

/// Extract the token text from one `data:` payload.
///
/// `Ok(None)` for special tokens, `[DONE]` and events without a token.
pub fn parse_token(data: &str) -> Result<Option<String>> {
    if data.trim() == "[DONE]" {
        return Ok(None);
    }

    let event: StreamEvent = serde_json::from_str(data)
        .map_err(|e| TutorError::StreamingError(format!("Malformed event: {}", e)))?;

    if let Some(error) = event.error {
        return Err(TutorError::InferenceApi(error));
    }

    Ok(event
        .token
        .filter(|t| !t.special)
        .map(|t| t.text))
}
