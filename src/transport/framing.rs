//! Record framing for the event stream
//!
//! The body is a sequence of records. Each record is one or more `data:`
//! lines followed by a blank line; the joined payload is one JSON object.
//! Framing state survives across reads so chunk boundaries may fall anywhere,
//! including inside a multi-byte character.

use super::types::StreamEvent;

const DATA_PREFIX: &str = "data:";

/// Incremental decoder from raw body bytes to [`StreamEvent`]s
#[derive(Debug, Default)]
pub struct RecordDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending_bytes: Vec<u8>,
    /// Decoded text not yet terminated by a line break
    line_buf: String,
    /// Payload of the record being assembled
    data_buf: String,
    /// Whether any `data:` line has been seen since the last terminator
    in_record: bool,
    /// Records dropped because their payload was not a valid event
    discarded: usize,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the body and return every record it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode_utf8(chunk);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of stream.
    ///
    /// A final line without a line break is still processed, and a record
    /// left open without its blank terminator is dispatched.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending_bytes.is_empty() {
            let tail = std::mem::take(&mut self.pending_bytes);
            self.line_buf.push_str(&String::from_utf8_lossy(&tail));
        }

        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.line_buf);
        let rest = rest.trim_end_matches('\r');
        if !rest.is_empty() {
            if let Some(event) = self.process_line(rest) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    /// Number of records dropped as undecodable so far
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending_bytes.extend_from_slice(chunk);
        let mut bytes = std::mem::take(&mut self.pending_bytes);

        loop {
            match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    self.line_buf.push_str(text);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&bytes[..valid]) {
                        self.line_buf.push_str(text);
                    }
                    match e.error_len() {
                        // Sequence cut off by the chunk boundary; wait for more bytes
                        None => {
                            self.pending_bytes = bytes.split_off(valid);
                            return;
                        }
                        Some(invalid) => {
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                            bytes.drain(..valid + invalid);
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.trim().is_empty() {
            return self.dispatch();
        }

        if let Some(payload) = line.trim_start().strip_prefix(DATA_PREFIX) {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            if self.in_record {
                self.data_buf.push('\n');
            }
            self.data_buf.push_str(payload);
            self.in_record = true;
        }
        // `event:`, `id:`, `retry:` and comment lines carry nothing we use

        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let data = std::mem::take(&mut self.data_buf);
        self.in_record = false;

        let payload = data.trim();
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                self.discarded += 1;
                tracing::warn!(error = %e, payload = %payload, "Discarding undecodable record");
                None
            }
        }
    }
}
