//! # Pipeline
//!
//! The run object. Owns every piece of per-run state and turns text lines
//! into rendered, validated events:
//!
//! ```text
//! ingest_line ──▶ classify ──┬─ CHANNEL ──▶ channel registry
//!                            ├─ MAX ──────▶ per-process line limit
//!                            └─ CAPLOG ─┬─ fragment ──▶ assembler ──┐
//!                                       └─ open/inner/close ────────┴─▶ reconstructor ──▶ processor
//! ```
//!
//! Problems with individual lines are written to the validation report as
//! `[ERROR] src=<source>:<line> <error> :: <raw text>` and never stop the run.

use super::channels::{ChannelDecl, ChannelRegistry};
use super::processor::{Processor, ProcessorStats};
use super::render::render_classified;
use crate::domain::{EventIndex, FragmentError, FrameError, ProcessId, ReconstructIssue, SourceId};
use crate::ingest::classify::RecordLine;
use crate::ingest::remap::ProcessIds;
use crate::ingest::{classify_line, reported_depth, ClassifiedLine, EventKind, IdentifierRemapper};
use crate::reconstruct::{
    CompletedLine, EventArena, FragmentAssembler, FragmentStart, FragmentStats, LogicalLine,
    ReconstructStats, RecoveryPolicy, StackReconstructor,
};
use crate::validation::{ValidationStats, Validator};
use caplog_common::{CAPLOG_PREFIX, CHANNEL_ANCHOR, DEFAULT_MAX_CHAR_SIZE, PROCESS_ANCHOR, THREAD_ANCHOR};
use log::{debug, trace, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{self, Write};

/// Output streams of a run
pub struct Sinks {
    /// One line per classified input line
    pub parsed: Box<dyn Write + Send>,
    /// Rendered events
    pub report: Box<dyn Write + Send>,
    /// Check results and reported errors
    pub validation: Box<dyn Write + Send>,
}

impl Sinks {
    /// Sinks that drop everything
    #[must_use]
    pub fn discard() -> Self {
        Self { parsed: Box::new(io::sink()), report: Box::new(io::sink()), validation: Box::new(io::sink()) }
    }

    /// # Errors
    ///
    /// The first flush failure.
    pub fn flush(&mut self) -> io::Result<()> {
        self.parsed.flush()?;
        self.report.flush()?;
        self.validation.flush()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Line limit for processes that never announced one
    pub default_limit: usize,
    pub recovery: RecoveryPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { default_limit: DEFAULT_MAX_CHAR_SIZE, recovery: RecoveryPolicy::default() }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineStats {
    pub seen: u64,
    pub classified: u64,
    pub ignored: u64,
    pub records: u64,
    pub channel_decls: u64,
    pub limit_announcements: u64,
    pub errors_reported: u64,
    pub warnings_reported: u64,
}

/// Everything a finished run knows, for the summary file
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub lines: LineStats,
    pub fragments: FragmentStats,
    pub reconstruction: ReconstructStats,
    pub processing: ProcessorStats,
    pub validation: ValidationStats,
    pub events: usize,
    pub live_objects: usize,
    pub processes: Vec<ProcessIds>,
    pub channels: Vec<ChannelDecl>,
}

pub struct Pipeline {
    options: PipelineOptions,
    remapper: IdentifierRemapper,
    channels: ChannelRegistry,
    limits: HashMap<ProcessId, usize>,
    fragments: FragmentAssembler,
    reconstructor: StackReconstructor,
    processor: Processor,
    validator: Validator,
    sinks: Sinks,
    stats: LineStats,
}

impl Pipeline {
    #[must_use]
    pub fn new(options: PipelineOptions, validator: Validator, sinks: Sinks) -> Self {
        Self {
            options,
            remapper: IdentifierRemapper::new(),
            channels: ChannelRegistry::default(),
            limits: HashMap::new(),
            fragments: FragmentAssembler::new(),
            reconstructor: StackReconstructor::new(options.recovery),
            processor: Processor::new(),
            validator,
            sinks,
            stats: LineStats::default(),
        }
    }

    #[must_use]
    pub fn arena(&self) -> &EventArena {
        self.reconstructor.arena()
    }

    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    #[must_use]
    pub fn remapper(&self) -> &IdentifierRemapper {
        &self.remapper
    }

    #[must_use]
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    #[must_use]
    pub fn stats(&self) -> LineStats {
        self.stats
    }

    /// Line limit in effect for `process`
    #[must_use]
    pub fn limit_for(&self, process: ProcessId) -> usize {
        self.limits.get(&process).copied().unwrap_or(self.options.default_limit)
    }

    /// Feed one text line of `source`.
    pub fn ingest_line(&mut self, source: SourceId, line_number: usize, line: &str) {
        self.stats.seen += 1;
        let Some(classified) = classify_line(line) else {
            self.stats.ignored += 1;
            trace!("{source}:{line_number} ignored");
            return;
        };
        self.stats.classified += 1;
        self.write_parsed(source, line_number, &classified);

        match classified {
            ClassifiedLine::Channel(ch) => {
                let (process, thread) = self.remapper.resolve(&ch.raw_process, &ch.raw_thread);
                self.channels.declare(process, thread, &ch);
                self.stats.channel_decls += 1;
            }
            ClassifiedLine::MaxCharSize { raw_process, limit } => {
                let process = self.remapper.process(&raw_process);
                debug!("{process} announced a line limit of {limit}");
                self.limits.insert(process, limit);
                self.stats.limit_announcements += 1;
            }
            ClassifiedLine::Record(rec) => {
                self.stats.records += 1;
                self.handle_record(source, line_number, line, rec);
            }
        }

        self.drain();
    }

    /// A framing problem on `source`, placed after the last line it delivered.
    pub fn report_frame_error(&mut self, source: SourceId, line_number: usize, err: &FrameError) {
        self.report_error(source, line_number, err, "<frame>");
    }

    /// A source ended: long lines it left unfinished are dropped.
    pub fn close_source(&mut self, source: SourceId) {
        for stale in self.fragments.close_source(source) {
            let err = FragmentError::Abandoned {
                process: stale.process,
                thread: stale.thread,
                reason: "source closed",
            };
            self.report_error(stale.source, stale.source_line, &err, &stale.prefix);
            self.reconstructor.abandon(stale.slot);
        }
        self.drain();
    }

    /// Drop unfinished long lines, process what is left and flush the sinks.
    pub fn finish(mut self) -> PipelineReport {
        for stale in self.fragments.drain_all() {
            let err = FragmentError::Abandoned {
                process: stale.process,
                thread: stale.thread,
                reason: "end of run",
            };
            self.report_error(stale.source, stale.source_line, &err, &stale.prefix);
            self.reconstructor.abandon(stale.slot);
        }
        self.drain();
        if let Err(e) = self.sinks.flush() {
            warn!("Failed to flush outputs: {e}");
        }

        PipelineReport {
            lines: self.stats,
            fragments: self.fragments.stats(),
            reconstruction: self.reconstructor.stats(),
            processing: self.processor.stats,
            validation: self.validator.stats(),
            events: self.reconstructor.arena().events().count(),
            live_objects: self.validator.state().live_objects(),
            processes: self.remapper.snapshot(),
            channels: self.channels.all().to_vec(),
        }
    }

    fn handle_record(&mut self, source: SourceId, line_number: usize, raw: &str, rec: RecordLine) {
        let (process, thread) = self.remapper.resolve(&rec.raw_process, &rec.raw_thread);
        let Some(kind) = EventKind::from_marker(&rec.marker) else {
            self.report_error(source, line_number, &ReconstructIssue::UnknownMarker(rec.marker.clone()), raw);
            return;
        };

        match kind {
            EventKind::ConcatBegin => {
                let slot = self.reconstructor.reserve();
                let start = FragmentStart {
                    process,
                    thread,
                    source,
                    source_line: line_number,
                    slot,
                    prefix: record_prefix(&rec),
                    chunk: &rec.payload,
                    frame_len: frame_len(raw, &rec),
                    limit: self.limit_for(process),
                };
                if let Some(stale) = self.fragments.begin(start) {
                    self.report_error(source, line_number, &FragmentError::Restarted { process, thread }, raw);
                    self.reconstructor.abandon(stale.slot);
                }
            }
            EventKind::ConcatContinue | EventKind::ConcatEnd => {
                match self.fragments.append(process, thread, kind, &rec.payload, frame_len(raw, &rec)) {
                    Ok(None) => {}
                    Ok(Some(done)) => self.commit_reassembled(done),
                    Err(e) => self.report_error(source, line_number, &e, raw),
                }
            }
            EventKind::BlockOpen | EventKind::BlockClose | EventKind::Inner => {
                if let Some(stale) = self.fragments.interrupt(process, thread) {
                    self.report_error(source, line_number, &FragmentError::Interrupted { process, thread }, raw);
                    self.reconstructor.abandon(stale.slot);
                }
                let logical = LogicalLine {
                    source,
                    source_line: line_number,
                    process,
                    thread,
                    channel: rec.channel,
                    kind,
                    depth: reported_depth(&rec.marker),
                    payload: rec.payload,
                };
                self.commit(logical, None, raw);
            }
        }
    }

    fn commit_reassembled(&mut self, done: CompletedLine) {
        debug!("{}:{} reassembled {} fragments", done.source, done.source_line, done.parts);
        let classified = classify_line(&done.line);
        if let Some(line) = &classified {
            self.write_parsed(done.source, done.source_line, line);
        }
        let logical = match classified {
            Some(ClassifiedLine::Record(rec)) => EventKind::from_marker(&rec.marker)
                .filter(|kind| !kind.is_fragment())
                .map(|kind| LogicalLine {
                    source: done.source,
                    source_line: done.source_line,
                    process: done.process,
                    thread: done.thread,
                    channel: rec.channel,
                    kind,
                    depth: reported_depth(&rec.marker),
                    payload: rec.payload,
                }),
            _ => None,
        };

        match logical {
            Some(logical) => self.commit(logical, Some(done.slot), &done.line),
            None => {
                self.report_error(done.source, done.source_line, &FragmentError::NotReassemblable, &done.line);
                self.reconstructor.abandon(done.slot);
            }
        }
    }

    fn commit(&mut self, logical: LogicalLine, slot: Option<EventIndex>, raw: &str) {
        let (source, line_number) = (logical.source, logical.source_line);
        match self.reconstructor.commit(logical, slot) {
            Ok(committed) => {
                for issue in &committed.issues {
                    if issue.is_warning() {
                        self.report_warning(source, line_number, issue, raw);
                    } else {
                        self.report_error(source, line_number, issue, raw);
                    }
                }
            }
            Err(issue @ ReconstructIssue::Quarantined { .. }) => {
                trace!("{source}:{line_number} dropped: {issue}");
            }
            Err(issue) => self.report_error(source, line_number, &issue, raw),
        }
    }

    fn drain(&mut self) {
        self.processor.drain(
            self.reconstructor.arena(),
            &mut self.validator,
            &mut *self.sinks.report,
            &mut *self.sinks.validation,
        );
    }

    fn write_parsed(&mut self, source: SourceId, line_number: usize, line: &ClassifiedLine) {
        let text = render_classified(&source.to_string(), line_number, line);
        if let Err(e) = writeln!(self.sinks.parsed, "{text}") {
            warn!("Failed to write parsed-line dump: {e}");
        }
    }

    fn report_error(&mut self, source: SourceId, line_number: usize, err: &dyn Display, raw: &str) {
        self.stats.errors_reported += 1;
        warn!("{source}:{line_number}: {err}");
        self.write_report("ERROR", source, line_number, err, raw);
    }

    fn report_warning(&mut self, source: SourceId, line_number: usize, err: &dyn Display, raw: &str) {
        self.stats.warnings_reported += 1;
        debug!("{source}:{line_number}: {err}");
        self.write_report("WARN", source, line_number, err, raw);
    }

    fn write_report(&mut self, level: &str, source: SourceId, line_number: usize, err: &dyn Display, raw: &str) {
        if let Err(e) = writeln!(self.sinks.validation, "[{level}] src={source}:{line_number} {err} :: {raw}") {
            warn!("Failed to write validation report: {e}");
        }
    }
}

/// `CAP_LOG : P=<p> T=<t> C=<c> ` of a record, for reassembly
fn record_prefix(rec: &RecordLine) -> String {
    format!(
        "{CAPLOG_PREFIX}{PROCESS_ANCHOR}{}{THREAD_ANCHOR}{}{CHANNEL_ANCHOR}{:03} ",
        rec.raw_process, rec.raw_thread, rec.channel.0
    )
}

/// Character length of a fragment line as the producer wrote it, counting a
/// separator the transport trimmed away.
fn frame_len(raw: &str, rec: &RecordLine) -> usize {
    let start = raw.find(CAPLOG_PREFIX).unwrap_or(0);
    raw[start..].trim_end_matches(['\r', '\n']).chars().count() + usize::from(!rec.separated)
}
