//! # Shared Wire Contract (Producer ↔ Consumer)
//!
//! Defines the byte layout and text tokens shared between the instrumenting
//! logger (the producer) and `caplog` (the consumer). Producers link this
//! crate to frame their output; the consumer links it to decode that output,
//! so both sides agree on every constant by construction.
//!
//! ## Layers
//!
//! 1. **Framing** - [`FrameHeader`] + payload, repeated over a TCP stream
//! 2. **Text lines** - `CAP_LOG : P=.. T=.. ...` records inside text frames
//! 3. **Fragments** - long lines split by [`fragment_line`] into concat parts
//!
//! ## Frame Layout
//!
//! ```text
//! ┌──────────────────────┬──────────────┬──────────────┬─────────────────┐
//! │ delimiter (8 bytes)  │ type (u32 LE)│ len (u32 LE) │ payload (len)   │
//! └──────────────────────┴──────────────┴──────────────┴─────────────────┘
//! ```
//!
//! Binary payloads carry `filename || bytes`.

#![no_std]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// Framing Constants
// ============================================================================

/// One half of the frame delimiter.
///
/// Byte-palindromic, so the marker reads the same whether the producer wrote
/// it as a big- or little-endian word.
pub const DELIMITER_MARKER: [u8; 4] = [0xC0, 0xDE, 0xDE, 0xC0];

/// Full 8-byte delimiter that opens every frame (two markers back to back).
pub const FRAME_DELIMITER: [u8; 8] = [0xC0, 0xDE, 0xDE, 0xC0, 0xC0, 0xDE, 0xDE, 0xC0];

/// Size of [`FrameHeader`] on the wire: delimiter + type + length.
pub const FRAME_HEADER_SIZE: usize = 16;

/// **Text payload**: one UTF-8 log line
pub const PAYLOAD_TEXT: u32 = 0;

/// **Binary payload**: `filename || bytes`
pub const PAYLOAD_BINARY: u32 = 1;

/// Separator between the filename and the bytes of a binary payload.
pub const BLOB_SEPARATOR: &[u8] = b"||";

/// Port the collector listens on when none is configured.
pub const DEFAULT_PORT: u16 = 7227;

/// Line length limit assumed for a process that never announced one.
pub const DEFAULT_MAX_CHAR_SIZE: usize = 1024;

// ============================================================================
// Text Line Tokens
// ============================================================================

/// Wrapper that opens every record.
pub const CAPLOG_PREFIX: &str = "CAP_LOG : ";

/// Process id field (directly after the wrapper).
pub const PROCESS_ANCHOR: &str = "P=";

/// Thread id field.
pub const THREAD_ANCHOR: &str = " T=";

/// Channel id field of a scope/message record.
pub const CHANNEL_ANCHOR: &str = " C=";

/// Channel id field of a channel declaration record.
pub const CHANNEL_DECL_ANCHOR: &str = " CHANNEL-ID=";

/// Separator between the fields of a channel declaration.
pub const FIELD_SEPARATOR: &str = " : ";

/// Verbosity field of a channel declaration.
pub const VERBOSITY_ANCHOR: &str = " : VERBOSITY=";

/// Line length announcement of a process.
pub const MAX_CHAR_ANCHOR: &str = " MAX-CHAR-SIZE=";

/// One nesting level inside an indentation marker.
pub const LEVEL_SYMBOL: char = ':';

/// Marker suffix: scope entered
pub const MARKER_OPEN: &str = "F";

/// Marker suffix: scope left
pub const MARKER_CLOSE: &str = "L";

/// Marker suffix: message inside the current scope (written as `->`)
pub const MARKER_INNER: &str = ">";

/// Marker: first fragment of a long line
pub const MARKER_CONCAT_BEGIN: &str = "|+";

/// Marker: middle fragment of a long line
pub const MARKER_CONCAT_CONTINUE: &str = "+";

/// Marker: last fragment of a long line
pub const MARKER_CONCAT_END: &str = "+|";

// ============================================================================
// Frame Header
// ============================================================================

/// Header that precedes every payload on the wire
///
/// **Memory Layout**: `#[repr(C)]`, but always (de)serialized field by field
/// through [`FrameHeader::to_bytes`] / [`FrameHeader::from_bytes`] so the
/// integer fields stay little-endian on every host.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Always [`FRAME_DELIMITER`]
    pub delimiter: [u8; 8],

    /// [`PAYLOAD_TEXT`] or [`PAYLOAD_BINARY`]
    pub payload_type: u32,

    /// Number of payload bytes following the header
    pub payload_len: u32,
}

impl FrameHeader {
    /// Header for a payload of `payload_len` bytes.
    #[must_use]
    pub const fn new(payload_type: u32, payload_len: u32) -> Self {
        Self { delimiter: FRAME_DELIMITER, payload_type, payload_len }
    }

    /// Encode for the wire.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[..8].copy_from_slice(&self.delimiter);
        out[8..12].copy_from_slice(&self.payload_type.to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    /// Decode from the first [`FRAME_HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if the slice is too short or does not start with the
    /// delimiter.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_HEADER_SIZE || bytes[..8] != FRAME_DELIMITER {
            return None;
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[8..12]);
        let payload_type = u32::from_le_bytes(word);
        word.copy_from_slice(&bytes[12..16]);
        let payload_len = u32::from_le_bytes(word);
        Some(Self { delimiter: FRAME_DELIMITER, payload_type, payload_len })
    }
}

/// Encode a complete text frame.
#[must_use]
pub fn encode_text_frame(line: &str) -> Vec<u8> {
    encode_frame(PAYLOAD_TEXT, line.as_bytes())
}

/// Encode a complete binary frame carrying `filename || bytes`.
#[must_use]
pub fn encode_blob_frame(filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(filename.len() + BLOB_SEPARATOR.len() + bytes.len());
    payload.extend_from_slice(filename.as_bytes());
    payload.extend_from_slice(BLOB_SEPARATOR);
    payload.extend_from_slice(bytes);
    encode_frame(PAYLOAD_BINARY, &payload)
}

#[allow(clippy::cast_possible_truncation)]
fn encode_frame(payload_type: u32, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader::new(payload_type, payload.len() as u32);
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

// ============================================================================
// Producer-Side Fragmentation
// ============================================================================

/// Split a logical line into concat fragments that each fit in `limit` chars.
///
/// `prefix` is the record header shared by every fragment
/// (`CAP_LOG : P=.. T=.. C=.. `) and `body` is everything after it
/// (`<indent> <payload>`). Lines that already fit are returned unchanged as a
/// single element.
///
/// Every fragment but the last is exactly `limit` chars; the last one is
/// space-padded to `limit`. Consumers restore chunk boundaries from the
/// padding even when the transport trims trailing spaces.
#[must_use]
pub fn fragment_line(prefix: &str, body: &str, limit: usize) -> Vec<String> {
    let prefix_len = prefix.chars().count();
    let chars: Vec<char> = body.chars().collect();

    if prefix_len + chars.len() <= limit {
        let mut whole = String::from(prefix);
        whole.push_str(body);
        return alloc::vec![whole];
    }

    let capacity = |marker: &str| limit.saturating_sub(prefix_len + marker.len() + 1).max(1);
    let begin_cap = capacity(MARKER_CONCAT_BEGIN);
    let continue_cap = capacity(MARKER_CONCAT_CONTINUE);
    let end_cap = capacity(MARKER_CONCAT_END);

    let mut fragments = Vec::new();
    let mut pos = begin_cap.min(chars.len());
    fragments.push(build_fragment(prefix, MARKER_CONCAT_BEGIN, &chars[..pos], limit));

    loop {
        let remaining = chars.len() - pos;
        if remaining <= end_cap {
            fragments.push(build_fragment(prefix, MARKER_CONCAT_END, &chars[pos..], limit));
            break;
        }
        let next = pos + continue_cap;
        fragments.push(build_fragment(prefix, MARKER_CONCAT_CONTINUE, &chars[pos..next], limit));
        pos = next;
    }

    fragments
}

fn build_fragment(prefix: &str, marker: &str, chunk: &[char], limit: usize) -> String {
    let mut line = String::from(prefix);
    line.push_str(marker);
    line.push(' ');
    line.extend(chunk.iter());
    let mut len = line.chars().count();
    while len < limit {
        line.push(' ');
        len += 1;
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = FrameHeader::new(PAYLOAD_BINARY, 0x0102_0304).to_bytes();
        assert_eq!(&bytes[..8], &FRAME_DELIMITER);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0]);
        assert_eq!(&bytes[12..16], &[4, 3, 2, 1]);
        assert_eq!(FrameHeader::from_bytes(&bytes), Some(FrameHeader::new(1, 0x0102_0304)));
    }

    #[test]
    fn test_header_rejects_missing_delimiter() {
        let mut bytes = FrameHeader::new(PAYLOAD_TEXT, 3).to_bytes();
        bytes[0] = 0;
        assert_eq!(FrameHeader::from_bytes(&bytes), None);
        assert_eq!(FrameHeader::from_bytes(&FRAME_DELIMITER), None);
    }

    #[test]
    fn test_delimiter_is_two_palindromic_markers() {
        let mut reversed = DELIMITER_MARKER;
        reversed.reverse();
        assert_eq!(reversed, DELIMITER_MARKER);
        assert_eq!(&FRAME_DELIMITER[..4], &DELIMITER_MARKER);
        assert_eq!(&FRAME_DELIMITER[4..], &DELIMITER_MARKER);
    }

    #[test]
    fn test_blob_frame_payload() {
        let frame = encode_blob_frame("dump.bin", &[9, 8]);
        assert_eq!(&frame[FRAME_HEADER_SIZE..], b"dump.bin||\x09\x08");
    }

    #[test]
    fn test_short_line_is_not_fragmented() {
        let parts = fragment_line("CAP_LOG : P=1 T=0 C=000 ", ":-> 1 [3] LOG: hi", 80);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], "CAP_LOG : P=1 T=0 C=000 :-> 1 [3] LOG: hi");
    }

    #[test]
    fn test_fragments_fill_limit() {
        let prefix = "CAP_LOG : P=1 T=0 C=000 ";
        let body = ":-> 1 [3] LOG: 0123456789012345678901234567890123456789012345678901234567890123";
        let parts = fragment_line(prefix, body, 40);

        assert!(parts.len() >= 3);
        assert!(parts[0].starts_with("CAP_LOG : P=1 T=0 C=000 |+ "));
        assert!(parts[1].starts_with("CAP_LOG : P=1 T=0 C=000 + "));
        assert!(parts.last().unwrap().starts_with("CAP_LOG : P=1 T=0 C=000 +| "));
        assert!(parts.iter().all(|p| p.chars().count() == 40));
    }
}
