//! Incremental Server-Sent Events decoder for streamed completions.
//!
//! Bytes arrive in arbitrary slices; events are separated by a blank line and
//! carry their payload on `data:` lines. The stream ends with `data: [DONE]`.
//! Slices may cut through a multi-byte character, so the buffer holds raw
//! bytes and only complete events are decoded.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Data(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every complete event payload they finish
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.contains(&b'\r') {
            self.normalize_newlines();
        }

        let mut out = Vec::new();
        while let Some(event_end) = find_blank_line(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            out.extend(Self::parse_event(&String::from_utf8_lossy(&event)));
        }
        out
    }

    /// Whatever remains when the byte stream closes without a trailing blank line
    pub fn finish(&mut self) -> Vec<SseData> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_event(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }

    /// Collapse `\r\n` to `\n`; a trailing `\r` waits for the next slice
    fn normalize_newlines(&mut self) {
        let mut normalized = Vec::with_capacity(self.buffer.len());
        let mut bytes = self.buffer.iter().copied().peekable();
        while let Some(byte) = bytes.next() {
            if byte == b'\r' && bytes.peek() == Some(&b'\n') {
                continue;
            }
            normalized.push(byte);
        }
        self.buffer = normalized;
    }

    fn parse_event(event: &str) -> Option<SseData> {
        let data: Vec<&str> = event
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
            .collect();
        if data.is_empty() {
            return None;
        }

        let payload = data.join("\n");
        if payload.trim() == "[DONE]" {
            Some(SseData::Done)
        } else {
            Some(SseData::Data(payload))
        }
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}
