//! Flat indented text rendering of committed events

use crate::ingest::classify::ClassifiedLine;
use crate::reconstruct::{EventPayload, StackEvent};
use std::fmt::Write;

/// `P<pid> T<tid> ` + two spaces per depth level + body
#[must_use]
pub fn render_event(event: &StackEvent) -> String {
    let mut out = format!("{} {} ", event.process, event.thread);
    for _ in 0..event.depth {
        out.push_str("  ");
    }
    match &event.payload {
        EventPayload::Block(block) => {
            let _ = write!(out, "::[{}]::[{}] {}", block.filename, block.function, block.object_id);
        }
        EventPayload::Inner(inner) if inner.tag.is_empty() => out.push_str(&inner.message),
        EventPayload::Inner(inner) => {
            let _ = write!(out, "{}: {}", inner.tag, inner.message);
        }
    }
    out
}

/// One line of the parsed-line dump
#[must_use]
pub fn render_classified(source_name: &str, line_number: usize, line: &ClassifiedLine) -> String {
    match line {
        ClassifiedLine::Record(rec) => format!(
            "{source_name}:{line_number} CAPLOG P={} T={} {} marker={:?} payload={:?}",
            rec.raw_process, rec.raw_thread, rec.channel, rec.marker, rec.payload
        ),
        ClassifiedLine::Channel(ch) => format!(
            "{source_name}:{line_number} CHANNEL P={} T={} {} state={} verbosity={} name={}",
            ch.raw_process, ch.raw_thread, ch.channel, ch.state, ch.verbosity, ch.name
        ),
        ClassifiedLine::MaxCharSize { raw_process, limit } => {
            format!("{source_name}:{line_number} MAX P={raw_process} limit={limit}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelId, EventIndex, ProcessId, SourceId, ThreadId};
    use crate::ingest::{classify_line, BlockInfo, EventKind, InnerInfo};

    fn event(depth: u32, payload: EventPayload) -> StackEvent {
        StackEvent {
            index: EventIndex(0),
            depth,
            process: ProcessId(1),
            thread: ThreadId(2),
            channel: ChannelId(0),
            kind: EventKind::Inner,
            caller: None,
            source: SourceId(0),
            source_line: 1,
            function_id: String::new(),
            code_line: None,
            payload,
        }
    }

    #[test]
    fn test_render_block_and_inner() {
        let open = event(
            1,
            EventPayload::Block(BlockInfo {
                filename: "a.cpp".to_string(),
                function: "Foo::Foo()".to_string(),
                object_id: "0x1".to_string(),
            }),
        );
        assert_eq!(render_event(&open), "P1 T2   ::[a.cpp]::[Foo::Foo()] 0x1");

        let msg = event(2, EventPayload::Inner(InnerInfo { tag: "LOG".to_string(), message: "hi".to_string() }));
        assert_eq!(render_event(&msg), "P1 T2     LOG: hi");
    }

    #[test]
    fn test_render_classified_max() {
        let line = classify_line("CAP_LOG : P=7 MAX-CHAR-SIZE=80").unwrap();
        assert_eq!(render_classified("src0", 3, &line), "src0:3 MAX P=7 limit=80");
    }
}
