//! Server-Sent Events (SSE) decoding.
//!
//! [`SseDecoder`] is fed raw body chunks as they arrive. Chunks may split
//! UTF-8 sequences, lines and whole events anywhere; the decoder buffers
//! until an event is complete.
//!
//! A frame over the size limit is dropped on its own; the events around it
//! are still returned and the error is kept for [`SseDecoder::take_skipped`].

use crate::error::TransportError;

/// Data payload some servers send to mark the end of a stream.
const DONE_MARKER: &str = "[DONE]";

/// Event names used for keep-alive frames.
const HEARTBEAT_EVENTS: &[&str] = &["heartbeat", "ping", "keepalive"];

/// A complete SSE event carrying data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `id:` field, if present.
    pub id: Option<String>,
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// The `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: String,
    // Trailing bytes of an incomplete UTF-8 sequence.
    partial: Vec<u8>,
    last_event_id: Option<String>,
    max_event_size: usize,
    // Set while the tail of an oversized, unterminated frame is arriving.
    discarding: bool,
    skipped: Vec<TransportError>,
}

impl SseDecoder {
    /// Create a decoder rejecting events larger than `max_event_size` bytes.
    #[must_use]
    pub const fn new(max_event_size: usize) -> Self {
        Self {
            buffer: String::new(),
            partial: Vec::new(),
            last_event_id: None,
            max_event_size,
            discarding: false,
            skipped: Vec::new(),
        }
    }

    /// The id of the last event that carried one.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Whether an incomplete event is buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buffer.trim().is_empty() || !self.partial.is_empty() || self.discarding
    }

    /// Errors for frames dropped since the last call.
    pub fn take_skipped(&mut self) -> Vec<TransportError> {
        std::mem::take(&mut self.skipped)
    }

    /// Feed a chunk and return the events it completed.
    ///
    /// Only undecodable UTF-8 fails the call. Oversized frames are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, TransportError> {
        self.decode_utf8(chunk)?;
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            match self.parse_block(&block[..end]) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => self.skipped.push(err),
            }
        }

        if self.buffer.len() > self.max_event_size {
            if !self.discarding {
                self.skipped.push(TransportError::MessageTooLarge {
                    size: self.buffer.len(),
                    max: self.max_event_size,
                });
            }
            self.buffer.clear();
            self.discarding = true;
        }
        Ok(events)
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.partial.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.partial) {
            Ok(_) => self.partial.len(),
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                self.partial.clear();
                return Err(TransportError::protocol(format!(
                    "invalid UTF-8 in event stream: {e}"
                )));
            }
        };
        self.buffer
            .push_str(&String::from_utf8_lossy(&self.partial[..valid]));
        self.partial.drain(..valid);
        Ok(())
    }

    fn parse_block(&mut self, block: &str) -> Result<Option<SseEvent>, TransportError> {
        let mut id = None;
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "id" => id = Some(value.to_string()),
                "event" => event = Some(value.to_string()),
                "data" => data.push(value),
                // retry: and unknown fields
                _ => {}
            }
        }

        if let Some(id) = &id {
            self.last_event_id = Some(id.clone());
        }

        let data = data.join("\n");
        if data.len() > self.max_event_size {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                max: self.max_event_size,
            });
        }
        let heartbeat = event
            .as_deref()
            .is_some_and(|name| HEARTBEAT_EVENTS.contains(&name));
        if data.trim().is_empty() || data.trim() == DONE_MARKER || heartbeat {
            return Ok(None);
        }

        Ok(Some(SseEvent { id, event, data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LIMIT: usize = 16 * 1024 * 1024;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new(LIMIT);
        let events = decoder
            .push(b"id: evt-001\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n")
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}");
        assert_eq!(decoder.last_event_id(), Some("evt-001"));
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_crlf_boundaries_and_multiline_data() {
        let mut decoder = SseDecoder::new(LIMIT);
        let events = decoder
            .push(b"event: message\r\ndata: line one\r\ndata: line two\r\n\r\n")
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new(LIMIT);
        assert!(decoder.push(b"id: 7\ndata: {\"a\":").unwrap().is_empty());
        assert!(decoder.has_partial());
        // CRLF split between chunks.
        assert!(decoder.push(b"1}\r").unwrap().is_empty());
        let events = decoder.push(b"\n\r\n").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut decoder = SseDecoder::new(LIMIT);
        let text = "data: héllo\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(decoder.push(&text[..split]).unwrap().is_empty());
        let events = decoder.push(&text[split..]).unwrap();
        assert_eq!(events[0].data, "héllo");
    }

    #[test]
    fn test_ignored_frames() {
        let mut decoder = SseDecoder::new(LIMIT);
        let events = decoder
            .push(b": keep-alive comment\n\nevent: heartbeat\ndata: {}\n\ndata: [DONE]\n\nid: 3\n\ndata: real\n\n")
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "real");
        // An id-only frame still advances the resume point.
        assert_eq!(decoder.last_event_id(), Some("3"));
    }

    #[test]
    fn test_event_too_large() {
        let mut decoder = SseDecoder::new(10);
        let events = decoder
            .push(b"data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n")
            .unwrap();
        assert!(events.is_empty());
        assert!(matches!(
            decoder.take_skipped().as_slice(),
            [TransportError::MessageTooLarge { max: 10, .. }]
        ));
        assert!(decoder.take_skipped().is_empty());
    }

    #[test]
    fn test_oversized_frame_between_valid_frames() {
        let mut decoder = SseDecoder::new(32);
        let huge = "x".repeat(100);
        let chunk = format!("data: ok1\n\ndata: {huge}\n\ndata: ok2\n\n");

        let events = decoder.push(chunk.as_bytes()).unwrap();
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, ["ok1", "ok2"]);
        assert_eq!(decoder.take_skipped().len(), 1);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_unterminated_event_over_limit() {
        let mut decoder = SseDecoder::new(16);
        let events = decoder
            .push(b"data: this frame never ends and keeps growing")
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(decoder.take_skipped().len(), 1);

        // The rest of the oversized frame is dropped, the next one decodes.
        let events = decoder.push(b" and growing\n\ndata: next\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "next");
        assert!(decoder.take_skipped().is_empty());
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut decoder = SseDecoder::new(LIMIT);
        let result = decoder.push(&[b'd', b'a', 0xFF, 0xFE, b'\n']);
        assert!(matches!(result, Err(TransportError::Protocol { .. })));
    }
}
