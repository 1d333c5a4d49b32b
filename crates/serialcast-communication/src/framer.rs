//! Newline framing for the device byte stream
//!
//! Bytes are buffered raw and split on `\n` before decoding, so a UTF-8
//! sequence that straddles two reads still decodes correctly. Each complete
//! line is decoded lossily and trimmed; invalid bytes become U+FFFD.

use serialcast_core::constants::DEFAULT_MAX_LINE_LENGTH;

/// Accumulates raw chunks and extracts complete lines.
///
/// At rest the buffer holds at most one unterminated fragment.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_length: usize,
}

impl LineFramer {
    /// Create a framer with the default fragment limit
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a framer that flushes fragments longer than `max_line_length`
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            max_line_length: max_line_length.max(1),
        }
    }

    /// Append `bytes` and return every line completed by them, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.buffer.extend_from_slice(&rest[..pos]);
            lines.push(Self::decode(&self.buffer));
            self.buffer.clear();
            rest = &rest[pos + 1..];
        }
        self.buffer.extend_from_slice(rest);

        if self.buffer.len() > self.max_line_length {
            tracing::warn!(
                "Flushing {} bytes without a newline (limit {})",
                self.buffer.len(),
                self.max_line_length
            );
            lines.push(Self::decode(&self.buffer));
            self.buffer.clear();
        }

        lines
    }

    /// The unterminated fragment carried into the next `feed`
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard the buffered fragment, returning how many bytes were dropped
    pub fn reset(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    fn decode(raw: &[u8]) -> String {
        String::from_utf8_lossy(raw).trim().to_string()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
