//! # Frame Parser
//!
//! Turns an arbitrary sequence of byte chunks from one stream into complete
//! frames. Chunk boundaries are invisible: feeding a stream whole or one byte
//! at a time yields the same frames and the same errors.
//!
//! ```text
//!   chunk ──▶ buffer ──▶ align on delimiter ──▶ header ──▶ payload complete?
//!                              │                              │
//!                              ▼                              ▼
//!                       garbage dropped              Text / Binary / error
//! ```
//!
//! ## Decisions per head frame
//!
//! - A delimiter shows up inside the declared payload: **truncated**, resume at
//!   that delimiter without waiting for the declared length
//! - Declared payload complete and delimiter-free: **emit**
//! - Not enough bytes to tell: **wait** for the next chunk (or [`FrameParser::finish`])
//!
//! A frame is the bytes between two delimiters, so payloads never contain one.
//!
//! Delimiter scanning for the head frame is incremental, so a large payload
//! arriving in many small chunks is searched once.

use crate::domain::FrameError;
use caplog_common::{
    FrameHeader, BLOB_SEPARATOR, FRAME_DELIMITER, FRAME_HEADER_SIZE, PAYLOAD_BINARY, PAYLOAD_TEXT,
};
use log::{debug, warn};
use serde::Serialize;

/// Payloads larger than this are treated as a corrupt length field.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

const DELIMITER_LEN: usize = FRAME_DELIMITER.len();

/// A decoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text, possibly holding several newline-separated lines
    Text(String),
    /// Binary attachment to be stored under `filename`
    Binary { filename: String, bytes: Vec<u8> },
}

/// Per-stream framing counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub frames: u64,
    pub text_frames: u64,
    pub binary_frames: u64,
    pub malformed: u64,
    pub garbage_bytes: u64,
    pub discarded_bytes: u64,
}

enum Decision {
    Wait,
    Emit,
    Truncated(usize),
}

/// Incremental frame decoder for one stream
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Stream offset of `buffer[0]`
    base_offset: u64,
    /// First payload position of the head frame not yet searched for a delimiter
    scanned: usize,
    /// Delimiter found inside the head frame's declared payload
    embedded: Option<usize>,
    stats: FrameStats,
}

impl FrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Bytes held back waiting for the rest of a frame
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every frame it completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame, FrameError>> {
        self.buffer.extend_from_slice(chunk);
        self.drain(false)
    }

    /// End of stream: decide every pending frame and drop leftover bytes.
    pub fn finish(&mut self) -> Vec<Result<Frame, FrameError>> {
        let out = self.drain(true);
        if !self.buffer.is_empty() {
            warn!(
                "Discarding {} bytes of incomplete frame at offset {}",
                self.buffer.len(),
                self.base_offset
            );
            self.stats.discarded_bytes += self.buffer.len() as u64;
            let len = self.buffer.len();
            self.consume(len);
        }
        out
    }

    fn drain(&mut self, at_eof: bool) -> Vec<Result<Frame, FrameError>> {
        let mut out = Vec::new();

        while self.align_to_delimiter() {
            let Some(header) = FrameHeader::from_bytes(&self.buffer) else {
                break;
            };
            let offset = self.base_offset;
            let declared = header.payload_len as usize;

            if declared > MAX_PAYLOAD_LEN {
                self.stats.malformed += 1;
                out.push(Err(FrameError::Oversized { offset, declared }));
                self.consume(DELIMITER_LEN);
                continue;
            }

            let end = FRAME_HEADER_SIZE + declared;
            match self.decide(end, at_eof) {
                Decision::Wait => break,
                Decision::Truncated(next) => {
                    self.stats.malformed += 1;
                    out.push(Err(FrameError::Truncated {
                        offset,
                        declared,
                        available: next - FRAME_HEADER_SIZE,
                    }));
                    self.consume(next);
                }
                Decision::Emit => {
                    let result = self.decode(header.payload_type, offset, end);
                    match &result {
                        Ok(Frame::Text(_)) => self.stats.text_frames += 1,
                        Ok(Frame::Binary { .. }) => self.stats.binary_frames += 1,
                        Err(_) => self.stats.malformed += 1,
                    }
                    if result.is_ok() {
                        self.stats.frames += 1;
                    }
                    out.push(result);
                    self.consume(end);
                }
            }
        }

        out
    }

    /// Drop bytes before the first delimiter. Returns false when no delimiter
    /// is buffered yet (a partial one may be kept at the tail).
    fn align_to_delimiter(&mut self) -> bool {
        if self.buffer.starts_with(&FRAME_DELIMITER) {
            return true;
        }
        if let Some(pos) = find_delimiter(&self.buffer, 0) {
            debug!("Skipping {pos} bytes before delimiter at offset {}", self.base_offset);
            self.stats.garbage_bytes += pos as u64;
            self.consume(pos);
            return true;
        }
        let keep = self.buffer.len().min(DELIMITER_LEN - 1);
        let drop = self.buffer.len() - keep;
        if drop > 0 {
            self.stats.garbage_bytes += drop as u64;
            self.consume(drop);
        }
        false
    }

    fn decide(&mut self, end: usize, at_eof: bool) -> Decision {
        if let Some(next) = self.scan_embedded(end) {
            return Decision::Truncated(next);
        }
        let len = self.buffer.len();
        if len < end {
            return Decision::Wait;
        }

        // Positions near the tail could still start a delimiter once more
        // bytes arrive.
        let checked = end.min(len.saturating_sub(DELIMITER_LEN - 1)).max(FRAME_HEADER_SIZE);
        let undecided = (checked..end).any(|p| is_delimiter_prefix(&self.buffer[p..]));
        if undecided && !at_eof {
            Decision::Wait
        } else {
            Decision::Emit
        }
    }

    /// Find the first delimiter starting inside `[FRAME_HEADER_SIZE, end)`,
    /// resuming where the previous call stopped.
    fn scan_embedded(&mut self, end: usize) -> Option<usize> {
        if self.embedded.is_some() {
            return self.embedded;
        }
        let start = self.scanned.max(FRAME_HEADER_SIZE);
        let limit = end.min(self.buffer.len().saturating_sub(DELIMITER_LEN - 1));
        if start < limit {
            self.embedded = self.buffer[start..limit + DELIMITER_LEN - 1]
                .windows(DELIMITER_LEN)
                .position(|w| w == FRAME_DELIMITER)
                .map(|rel| start + rel);
            self.scanned = limit;
        }
        self.embedded
    }

    fn decode(&self, payload_type: u32, offset: u64, end: usize) -> Result<Frame, FrameError> {
        let payload = &self.buffer[FRAME_HEADER_SIZE..end];
        match payload_type {
            PAYLOAD_TEXT => Ok(Frame::Text(String::from_utf8_lossy(payload).into_owned())),
            PAYLOAD_BINARY => {
                let split = payload
                    .windows(BLOB_SEPARATOR.len())
                    .position(|w| w == BLOB_SEPARATOR)
                    .ok_or(FrameError::MissingBlobSeparator { offset })?;
                Ok(Frame::Binary {
                    filename: String::from_utf8_lossy(&payload[..split]).into_owned(),
                    bytes: payload[split + BLOB_SEPARATOR.len()..].to_vec(),
                })
            }
            other => Err(FrameError::UnknownPayloadType { offset, payload_type: other }),
        }
    }

    fn consume(&mut self, n: usize) {
        self.buffer.drain(..n);
        self.base_offset += n as u64;
        self.scanned = FRAME_HEADER_SIZE;
        self.embedded = None;
    }
}

fn find_delimiter(bytes: &[u8], from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(DELIMITER_LEN)
        .position(|w| w == FRAME_DELIMITER)
        .map(|rel| from + rel)
}

/// True if `bytes` could be the start of a delimiter (empty counts).
fn is_delimiter_prefix(bytes: &[u8]) -> bool {
    let n = bytes.len().min(DELIMITER_LEN);
    bytes[..n] == FRAME_DELIMITER[..n]
}

/// Split a text payload into its non-empty lines.
pub fn text_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|l| l.trim_end_matches('\r')).filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use caplog_common::{encode_blob_frame, encode_text_frame};

    fn collect_all(parser: &mut FrameParser, bytes: &[u8]) -> Vec<Result<Frame, FrameError>> {
        let mut out = parser.push(bytes);
        out.extend(parser.finish());
        out
    }

    #[test]
    fn test_single_text_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push(&encode_text_frame("hello"));
        assert_eq!(frames, vec![Ok(Frame::Text("hello".to_string()))]);
        assert_eq!(parser.stats().frames, 1);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_header_split_across_chunks() {
        let bytes = encode_text_frame("abc");
        let mut parser = FrameParser::new();
        assert!(parser.push(&bytes[..5]).is_empty());
        assert!(parser.push(&bytes[5..12]).is_empty());
        assert_eq!(parser.push(&bytes[12..]), vec![Ok(Frame::Text("abc".to_string()))]);
    }

    #[test]
    fn test_blob_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push(&encode_blob_frame("core.dmp", b"\x00\x01||x"));
        assert_eq!(
            frames,
            vec![Ok(Frame::Binary { filename: "core.dmp".to_string(), bytes: b"\x00\x01||x".to_vec() })]
        );
    }

    #[test]
    fn test_blob_without_separator() {
        let mut bytes = encode_text_frame("nosep");
        bytes[8] = 1;
        let frames = FrameParser::new().push(&bytes);
        assert_eq!(frames, vec![Err(FrameError::MissingBlobSeparator { offset: 0 })]);
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let mut bytes = b"junk".to_vec();
        bytes.extend(encode_text_frame("ok"));
        let mut parser = FrameParser::new();
        assert_eq!(parser.push(&bytes), vec![Ok(Frame::Text("ok".to_string()))]);
        assert_eq!(parser.stats().garbage_bytes, 4);
    }

    #[test]
    fn test_short_payload_resyncs_on_next_delimiter() {
        let mut bad = encode_text_frame("short");
        bad[12] = 9; // declares 9 bytes, carries 5
        let mut bytes = bad;
        bytes.extend(encode_text_frame("next line here"));

        let mut parser = FrameParser::new();
        let frames = collect_all(&mut parser, &bytes);
        assert_eq!(
            frames,
            vec![
                Err(FrameError::Truncated { offset: 0, declared: 9, available: 5 }),
                Ok(Frame::Text("next line here".to_string())),
            ]
        );
        assert_eq!(parser.stats().malformed, 1);
    }

    #[test]
    fn test_short_payload_resyncs_without_end_of_stream() {
        let mut bytes = FrameHeader::new(PAYLOAD_TEXT, 4096).to_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        for i in 0..20 {
            bytes.extend(encode_text_frame(&format!("line {i}")));
        }

        let mut parser = FrameParser::new();
        let frames = parser.push(&bytes);
        assert_eq!(frames.len(), 21);
        assert_eq!(frames[0], Err(FrameError::Truncated { offset: 0, declared: 4096, available: 5 }));
        assert_eq!(frames[20], Ok(Frame::Text("line 19".to_string())));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_short_payload_resyncs_as_bytes_trickle_in() {
        let mut bytes = FrameHeader::new(PAYLOAD_TEXT, 4096).to_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        bytes.extend(encode_text_frame("next"));

        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for byte in &bytes {
            frames.extend(parser.push(std::slice::from_ref(byte)));
        }
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(FrameError::Truncated { declared: 4096, .. })));
        assert_eq!(frames[1], Ok(Frame::Text("next".to_string())));
    }

    #[test]
    fn test_embedded_delimiter_ends_frame() {
        let mut payload = b"a".to_vec();
        payload.extend_from_slice(&FRAME_DELIMITER);
        let mut bytes = encode_blob_frame("d.bin", &payload);
        bytes.extend(encode_text_frame("after"));

        let frames = FrameParser::new().push(&bytes);
        assert!(matches!(frames[0], Err(FrameError::Truncated { offset: 0, .. })));
        assert_eq!(frames.last(), Some(&Ok(Frame::Text("after".to_string()))));
    }

    #[test]
    fn test_oversized_length_resyncs() {
        let mut bad = encode_text_frame("x");
        bad[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let mut bytes = bad;
        bytes.extend(encode_text_frame("y"));

        let frames = collect_all(&mut FrameParser::new(), &bytes);
        assert!(matches!(frames[0], Err(FrameError::Oversized { .. })));
        assert_eq!(frames.last(), Some(&Ok(Frame::Text("y".to_string()))));
    }

    #[test]
    fn test_incomplete_tail_is_discarded_on_finish() {
        let bytes = encode_text_frame("complete me");
        let mut parser = FrameParser::new();
        assert!(parser.push(&bytes[..bytes.len() - 3]).is_empty());
        assert!(parser.finish().is_empty());
        assert_eq!(parser.stats().discarded_bytes, (bytes.len() - 3) as u64);
    }

    #[test]
    fn test_text_lines_splits_and_skips_empty() {
        let lines: Vec<_> = text_lines("a\r\n\nb\n").collect();
        assert_eq!(lines, vec!["a", "b"]);
    }
}
