//! Incremental Server-Sent Events decoder.
//!
//! Bytes are buffered per line, so chunk boundaries may fall anywhere,
//! including inside a multi-byte character.

use super::TransportError;

/// Longest line, and longest joined event data, a stream may send.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseMessage {
    /// `event:` field, if any
    pub event: Option<String>,
    /// Joined `data:` lines
    pub data: String,
    /// Last event id seen on the stream
    pub id: Option<String>,
}

impl SseMessage {
    /// A default-typed event carrying `data`.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Whether this is a plain `message` event (the only type classifiers see).
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    event: Option<String>,
    last_id: Option<String>,
    after_cr: bool,
    max_line_bytes: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            line: Vec::new(),
            data: String::new(),
            event: None,
            last_id: None,
            after_cr: false,
            max_line_bytes,
        }
    }

    /// Feed one chunk, returning every event it completes.
    ///
    /// # Errors
    ///
    /// `TransportError::Read` once a line or an event's data outgrows the
    /// limit; the decoder should not be fed again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseMessage>, TransportError> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut out),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut out);
                }
                _ => {
                    if self.line.len() >= self.max_line_bytes {
                        return Err(TransportError::Read(format!(
                            "line exceeds {} bytes",
                            self.max_line_bytes
                        )));
                    }
                    self.line.push(byte);
                }
            }
            if self.data.len() > self.max_line_bytes {
                return Err(TransportError::Read(format!(
                    "event data exceeds {} bytes",
                    self.max_line_bytes
                )));
            }
        }
        Ok(out)
    }

    fn end_line(&mut self, out: &mut Vec<SseMessage>) {
        let bytes = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&bytes).into_owned();
        if let Some(message) = self.process_line(&line) {
            out.push(message);
        }
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // Reconnect timing belongs to the retry policy, not the server.
            "retry" => {}
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take().filter(|e| !e.is_empty());
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseMessage {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}
