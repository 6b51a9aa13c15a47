//! Incremental server-sent-events parser
//!
//! Network chunks can end anywhere: inside a line, between `\r` and `\n`,
//! or in the middle of a multi-byte character. The parser buffers raw bytes
//! and only decodes complete lines.

/// One dispatched SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Byte-level SSE parser
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        // '\n' never occurs inside a multi-byte UTF-8 sequence, so every
        // drained line is complete text.
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
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
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let event = SseEvent {
            event: self.event.take(),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: ping\ndata: {\"type\": \"ping\"}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("ping".to_string()),
                data: "{\"type\": \"ping\"}".to_string(),
            }]
        );
    }

    #[test]
    fn test_split_across_chunks_and_crlf() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: message_stop\r").is_empty());
        assert!(parser.push(b"\ndata: {\"ty").is_empty());
        assert!(parser.push(b"pe\":\"message_stop\"}\r\n").is_empty());
        let events = parser.push(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"type\":\"message_stop\"}");
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "data: caf\u{e9} \u{1f600}\n\n".as_bytes();
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for byte in text {
            events.extend(parser.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "caf\u{e9} \u{1f600}");
    }

    #[test]
    fn test_comments_multiline_data_and_finish() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keep-alive\ndata: a\ndata: b\n\ndata: tail");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
        assert_eq!(events[0].event, None);

        let last = parser.finish().unwrap();
        assert_eq!(last.data, "tail");
        assert!(parser.finish().is_none());
    }
}
