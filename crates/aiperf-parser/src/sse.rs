//! SSE frame reader (§4.5).
//!
//! The HTTP client owns the socket and feeds raw bytes to a [`SseReader`] as
//! they arrive; this module owns only the framing and line-parsing rules so
//! it stays independently testable without a live connection. Framing follows
//! the WHATWG server-sent events line-parsing rules: CR, LF, and CRLF are all
//! accepted line terminators, a frame ends at the first blank line, lines
//! with no colon become a field with a null value, and a line starting with
//! `:` is a comment. OpenAI's wire format only ever sends a `data` field, so
//! that's the only one this reader surfaces.

use aiperf_core::clock::PerfNs;
use serde::{Deserialize, Serialize};

/// One complete SSE frame, timestamped at both the first and last byte that
/// made it up. `data` is the concatenation of every `data:` line in the
/// frame, joined by `\n` per spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseFrame {
    pub first_byte_perf_ns: PerfNs,
    pub last_byte_perf_ns: PerfNs,
    pub data: String,
}

/// Incremental frame splitter fed one network read at a time.
pub struct SseReader {
    buffer: String,
    frame_start_ns: Option<PerfNs>,
}

impl SseReader {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            frame_start_ns: None,
        }
    }

    /// Feed a chunk of freshly-received bytes (decoded lossily as UTF-8) and
    /// the `perf_ns` timestamp at which the chunk finished arriving. Returns
    /// every frame this chunk completed, in arrival order. Comment-only and
    /// data-less frames (heartbeats) are consumed but not returned.
    pub fn feed(&mut self, bytes: &[u8], recv_perf_ns: PerfNs) -> Vec<SseFrame> {
        if self.buffer.is_empty() && self.frame_start_ns.is_none() {
            self.frame_start_ns = Some(recv_perf_ns);
        }
        let decoded = String::from_utf8_lossy(bytes).replace("\r\n", "\n").replace('\r', "\n");
        self.buffer.push_str(&decoded);

        let mut frames = Vec::new();
        while let Some(end) = self.buffer.find("\n\n") {
            let raw_frame: String = self.buffer.drain(..end).collect();
            self.buffer.drain(..2); // the blank-line terminator itself
            let start_ns = self.frame_start_ns.take().unwrap_or(recv_perf_ns);
            if let Some(data) = parse_frame(&raw_frame) {
                frames.push(SseFrame {
                    first_byte_perf_ns: start_ns,
                    last_byte_perf_ns: recv_perf_ns,
                    data,
                });
            }
            if !self.buffer.is_empty() {
                self.frame_start_ns = Some(recv_perf_ns);
            }
        }
        frames
    }
}

impl Default for SseReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_frame(raw: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        if field == "data" {
            data_lines.push(value);
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_a_single_frame_delivered_whole() {
        let mut reader = SseReader::new();
        let frames = reader.feed(b"data: {\"a\":1}\n\n", 100);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[test]
    fn splits_frames_arriving_across_multiple_reads() {
        let mut reader = SseReader::new();
        assert!(reader.feed(b"data: {\"a\":", 10).is_empty());
        let frames = reader.feed(b"1}\n\n", 20);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].first_byte_perf_ns, 10);
        assert_eq!(frames[0].last_byte_perf_ns, 20);
    }

    #[test]
    fn multiline_data_fields_join_with_newline() {
        let mut reader = SseReader::new();
        let frames = reader.feed(b"data: line one\ndata: line two\n\n", 5);
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn comment_only_frames_are_dropped() {
        let mut reader = SseReader::new();
        let frames = reader.feed(b": keep-alive\n\n", 5);
        assert!(frames.is_empty());
    }

    #[test]
    fn multiple_frames_in_one_read_all_surface() {
        let mut reader = SseReader::new();
        let frames = reader.feed(b"data: one\n\ndata: two\n\n", 5);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "one");
        assert_eq!(frames[1].data, "two");
    }

    #[test]
    fn colon_less_line_is_a_field_with_null_value_and_ignored_for_data() {
        let mut reader = SseReader::new();
        let frames = reader.feed(b"retry\ndata: ok\n\n", 5);
        assert_eq!(frames[0].data, "ok");
    }
}
