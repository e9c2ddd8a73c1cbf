//! Server-sent-event framing.
//!
//! Turns raw body chunks into the `data` payload of each complete event. Chunks
//! may split lines (and multi-byte characters) anywhere.

use tracing::{trace, warn};

/// Longest line held while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    max_line_bytes: usize,
    /// Set after an oversized line was dropped; skip input until its newline.
    discarding: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_line_limit(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            data: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed one chunk and collect the payloads of any events it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut events = Vec::new();
        let mut rest = chunk;
        while let Some(newline) = rest.iter().position(|b| *b == b'\n') {
            let (line, tail) = rest.split_at(newline + 1);
            rest = tail;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            self.buffer.extend_from_slice(&line[..newline]);
            let line = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&line);
            self.process_line(line.trim_end_matches('\r'), &mut events);
        }

        if !self.discarding {
            self.buffer.extend_from_slice(rest);
            if self.buffer.len() > self.max_line_bytes {
                warn!(
                    buffered = self.buffer.len(),
                    limit = self.max_line_bytes,
                    "Dropping oversized event-stream line"
                );
                self.buffer.clear();
                self.data.clear();
                self.discarding = true;
            }
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data.is_empty() {
                events.push(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" | "id" | "retry" => {}
            other => trace!(field = other, "Ignoring unknown event-stream field"),
        }
    }
}
