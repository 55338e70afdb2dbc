//! Line classification
//!
//! Every text line is tried against three shapes, in this order:
//!
//! | Shape   | Example                                                       |
//! |---------|---------------------------------------------------------------|
//! | CHANNEL | `CAP_LOG : P=1 T=0 CHANNEL-ID=003 : ENABLED : VERBOSITY=2 : ::Net` |
//! | CAPLOG  | `CAP_LOG : P=1 T=0 C=000 :-F 7 [10]::[a.cpp]::[Foo::Foo()] 0x1` |
//! | MAX     | `CAP_LOG : P=1 MAX-CHAR-SIZE=512`                             |
//!
//! Lines matching none of them are ignored. Record payloads are split further
//! by [`split_payload_header`], [`parse_block`] and [`parse_inner`].

use super::tokenizer::{Anchor, Pattern};
use crate::domain::ChannelId;
use caplog_common::{
    CAPLOG_PREFIX, CHANNEL_ANCHOR, CHANNEL_DECL_ANCHOR, FIELD_SEPARATOR, LEVEL_SYMBOL,
    MARKER_CLOSE, MARKER_CONCAT_BEGIN, MARKER_CONCAT_CONTINUE, MARKER_CONCAT_END, MARKER_INNER,
    MARKER_OPEN, MAX_CHAR_ANCHOR, PROCESS_ANCHOR, THREAD_ANCHOR, VERBOSITY_ANCHOR,
};
use serde::Serialize;

const CHANNEL_PATTERN: Pattern = Pattern::new(&[
    Anchor::new(CAPLOG_PREFIX),
    Anchor::at_start(PROCESS_ANCHOR),
    Anchor::new(THREAD_ANCHOR),
    Anchor::new(CHANNEL_DECL_ANCHOR),
    Anchor::new(FIELD_SEPARATOR),
    Anchor::new(VERBOSITY_ANCHOR),
    Anchor::new(FIELD_SEPARATOR),
]);

const CAPLOG_PATTERN: Pattern = Pattern::new(&[
    Anchor::new(CAPLOG_PREFIX),
    Anchor::at_start(PROCESS_ANCHOR),
    Anchor::new(THREAD_ANCHOR),
    Anchor::new(CHANNEL_ANCHOR),
    Anchor::new(" "),
    Anchor::new(" "),
]);

/// Record whose trailing spaces (separator included) were trimmed in transit
const CAPLOG_BARE_PATTERN: Pattern = Pattern::new(&[
    Anchor::new(CAPLOG_PREFIX),
    Anchor::at_start(PROCESS_ANCHOR),
    Anchor::new(THREAD_ANCHOR),
    Anchor::new(CHANNEL_ANCHOR),
    Anchor::new(" "),
]);

const MAX_PATTERN: Pattern = Pattern::new(&[
    Anchor::new(CAPLOG_PREFIX),
    Anchor::at_start(PROCESS_ANCHOR),
    Anchor::new(MAX_CHAR_ANCHOR),
]);

const PAYLOAD_HEADER_PATTERN: Pattern = Pattern::new(&[Anchor::new(" ["), Anchor::new("]")]);

const BLOCK_PATTERN: Pattern = Pattern::new(&[Anchor::at_start("::["), Anchor::new("]::[")]);

const INNER_PATTERN: Pattern = Pattern::new(&[Anchor::at_start(" ").optional(), Anchor::new(":").optional()]);

/// Kind of a CAPLOG record, decided by its indentation marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BlockOpen,
    BlockClose,
    Inner,
    ConcatBegin,
    ConcatContinue,
    ConcatEnd,
}

impl EventKind {
    /// Map a marker such as `::-F` or `+|` to its kind.
    ///
    /// Concat markers are tested first since `+|` also contains `+`.
    #[must_use]
    pub fn from_marker(marker: &str) -> Option<Self> {
        if marker.contains(MARKER_CONCAT_BEGIN) {
            Some(Self::ConcatBegin)
        } else if marker.contains(MARKER_CONCAT_END) {
            Some(Self::ConcatEnd)
        } else if marker.contains(MARKER_OPEN) {
            Some(Self::BlockOpen)
        } else if marker.contains(MARKER_CLOSE) {
            Some(Self::BlockClose)
        } else if marker.contains(MARKER_INNER) {
            Some(Self::Inner)
        } else if marker.contains(MARKER_CONCAT_CONTINUE) {
            Some(Self::ConcatContinue)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_fragment(self) -> bool {
        matches!(self, Self::ConcatBegin | Self::ConcatContinue | Self::ConcatEnd)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockOpen => "open",
            Self::BlockClose => "close",
            Self::Inner => "inner",
            Self::ConcatBegin => "concat-begin",
            Self::ConcatContinue => "concat-continue",
            Self::ConcatEnd => "concat-end",
        }
    }
}

/// Nesting level claimed by an indentation marker
#[must_use]
pub fn reported_depth(marker: &str) -> u32 {
    u32::try_from(marker.chars().filter(|c| *c == LEVEL_SYMBOL).count()).unwrap_or(u32::MAX)
}

/// `CAP_LOG : P=.. T=.. C=.. <marker> <payload>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    pub raw_process: String,
    pub raw_thread: String,
    pub channel: ChannelId,
    pub marker: String,
    pub payload: String,
    /// False when the separator after the marker was trimmed away
    pub separated: bool,
}

/// `CAP_LOG : P=.. T=.. CHANNEL-ID=.. : <state> : VERBOSITY=.. : <indent><name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLine {
    pub raw_process: String,
    pub raw_thread: String,
    pub channel: ChannelId,
    pub state: String,
    pub verbosity: u32,
    pub name: String,
    pub depth: u32,
}

impl ChannelLine {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.state.eq_ignore_ascii_case("ENABLED")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedLine {
    Channel(ChannelLine),
    Record(RecordLine),
    MaxCharSize { raw_process: String, limit: usize },
}

/// Classify one text line, or `None` if it is not a CAP_LOG line.
#[must_use]
pub fn classify_line(line: &str) -> Option<ClassifiedLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    parse_channel(line)
        .map(ClassifiedLine::Channel)
        .or_else(|| parse_record(line).map(ClassifiedLine::Record))
        .or_else(|| parse_max_char_size(line))
}

fn parse_channel(line: &str) -> Option<ChannelLine> {
    let caps = CHANNEL_PATTERN.extract(line)?;
    let raw_process = non_empty(caps.before(2))?;
    let raw_thread = non_empty(caps.before(3))?;
    let channel = parse_channel_id(caps.before(4))?;
    let verbosity = caps.before(6).trim().parse().ok()?;
    let tail = caps.tail();
    let name_start = tail.find(|c: char| c.is_alphanumeric() || c == '_').unwrap_or(tail.len());
    let (indent, name) = tail.split_at(name_start);

    Some(ChannelLine {
        raw_process,
        raw_thread,
        channel,
        state: caps.before(5).trim().to_string(),
        verbosity,
        name: name.trim().to_string(),
        depth: reported_depth(indent),
    })
}

fn parse_record(line: &str) -> Option<RecordLine> {
    let (caps, separated) = match CAPLOG_PATTERN.extract(line) {
        Some(caps) => (caps, true),
        None => (CAPLOG_BARE_PATTERN.extract(line)?, false),
    };
    let (marker, payload) =
        if separated { (caps.before(5), caps.tail()) } else { (caps.tail(), "") };
    let marker = non_empty(marker)?;

    Some(RecordLine {
        raw_process: non_empty(caps.before(2))?,
        raw_thread: non_empty(caps.before(3))?,
        channel: parse_channel_id(caps.before(4))?,
        marker,
        payload: payload.to_string(),
        separated,
    })
}

fn parse_max_char_size(line: &str) -> Option<ClassifiedLine> {
    let caps = MAX_PATTERN.extract(line)?;
    Some(ClassifiedLine::MaxCharSize {
        raw_process: non_empty(caps.before(2))?,
        limit: caps.tail().trim().parse().ok()?,
    })
}

fn parse_channel_id(raw: &str) -> Option<ChannelId> {
    raw.trim().parse().ok().map(ChannelId)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `<functionId> [<line>]` in front of every scope/message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader<'a> {
    pub function_id: &'a str,
    pub code_line: Option<u32>,
    pub rest: &'a str,
}

/// Split off the `<functionId> [<line>]` header; payloads without one keep
/// their full text in `rest`.
#[must_use]
pub fn split_payload_header(payload: &str) -> PayloadHeader<'_> {
    match PAYLOAD_HEADER_PATTERN.extract(payload) {
        Some(caps) if !caps.before(0).contains(' ') => PayloadHeader {
            function_id: caps.before(0).trim(),
            code_line: caps.before(1).trim().parse().ok(),
            rest: caps.tail(),
        },
        _ => PayloadHeader { function_id: "", code_line: None, rest: payload },
    }
}

/// `::[<file>]::[<function>] <objectId>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    pub filename: String,
    pub function: String,
    pub object_id: String,
}

/// `<tag>: <message>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InnerInfo {
    pub tag: String,
    pub message: String,
}

#[must_use]
pub fn parse_block(rest: &str) -> Option<BlockInfo> {
    let caps = BLOCK_PATTERN.extract(rest)?;
    let tail = caps.tail();
    // The last "] " closes the function; signatures may contain brackets.
    let (function, object_id) = match tail.rfind("] ") {
        Some(at) => (&tail[..at], tail[at + 2..].trim()),
        None => (tail.trim_end().strip_suffix(']')?, ""),
    };
    if function.is_empty() {
        return None;
    }
    Some(BlockInfo {
        filename: caps.before(1).to_string(),
        function: function.to_string(),
        object_id: object_id.to_string(),
    })
}

#[must_use]
pub fn parse_inner(rest: &str) -> Option<InnerInfo> {
    let caps = INNER_PATTERN.extract(rest)?;
    let tag = caps.before(1).trim();
    let message = caps.tail().trim();
    if tag.is_empty() && message.is_empty() {
        return None;
    }
    Some(InnerInfo { tag: tag.to_string(), message: message.to_string() })
}
