//! `text/event-stream` framing
//!
//! Incremental decoder: feed it body chunks as they arrive and it yields the
//! complete events. Chunks may split lines (and UTF-8 sequences) anywhere.

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// `event:` field; `None` means the default `message` type
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last `id:` seen in this event
    pub id: Option<String>,
    /// `retry:` reconnection hint in milliseconds
    pub retry: Option<u64>,
}

impl SseFrame {
    /// Event name with the protocol default applied
    pub fn event_name(&self) -> &str {
        match self.event.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "message",
        }
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: String,
    id: Option<String>,
    retry: Option<u64>,
    /// Previous chunk ended in CR; a leading LF belongs to it
    skip_lf: bool,
    started: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut chunk = chunk;
        if self.skip_lf && !chunk.is_empty() {
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
            self.skip_lf = false;
        }
        self.buffer.extend_from_slice(chunk);

        if !self.started {
            if self.buffer.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(b"\xEF\xBB\xBF") {
                self.buffer.drain(..3);
            }
            self.started = true;
        }

        let mut frames = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < self.buffer.len() {
            match self.buffer[i] {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.buffer[start..i]).into_owned();
                    self.process_line(&line, &mut frames);
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.buffer[start..i]).into_owned();
                    self.process_line(&line, &mut frames);
                    i += 1;
                    if i == self.buffer.len() {
                        self.skip_lf = true;
                    } else if self.buffer[i] == b'\n' {
                        i += 1;
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buffer.drain(..start);
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            self.dispatch(frames);
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
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = self.event.take();
        let retry = self.retry.take();
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        frames.push(SseFrame {
            event,
            data,
            id: self.id.clone(),
            retry,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_default_events() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(
            b"event: new_order\ndata: {\"_id\":\"o1\"}\n\ndata: {\"type\":\"heartbeat\"}\n\n",
        );
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_name(), "new_order");
        assert_eq!(frames[0].data, r#"{"_id":"o1"}"#);
        assert_eq!(frames[1].event_name(), "message");
    }

    #[test]
    fn test_chunk_boundaries_anywhere() {
        let stream = "event: order_updated\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\n".as_bytes();
        for split in 0..stream.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.feed(&stream[..split]);
            frames.extend(decoder.feed(&stream[split..]));
            assert_eq!(frames.len(), 1, "split at {split}");
            assert_eq!(frames[0].data, "{\"a\":\n1}");
            assert_eq!(frames[0].event_name(), "order_updated");
        }
    }

    #[test]
    fn test_split_utf8_sequence() {
        let stream = "data: ₹499\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let mut frames = decoder.feed(&stream[..8]);
        frames.extend(decoder.feed(&stream[8..]));
        assert_eq!(frames[0].data, "₹499");
    }

    #[test]
    fn test_comments_retry_id_and_bom() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"\xEF\xBB\xBF: keep-alive\nretry: 3000\nid: 7\ndata\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "");
        assert_eq!(frames[0].retry, Some(3000));
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn test_event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n").is_empty());
        // event name does not leak into the next frame
        let frames = decoder.feed(b"data: x\n\n");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn test_incomplete_event_is_held() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial").is_empty());
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\n").len(), 1);
    }
}
