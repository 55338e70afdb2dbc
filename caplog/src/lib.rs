//! # caplog - CAP_LOG Trace Collector and Validator
//!
//! caplog receives the `CAP_LOG` trace output of instrumented processes,
//! rebuilds the call stack of every thread from the indentation each record
//! claims, and runs a behavior tree over the reconstructed events to check
//! invariants such as "the object announced by `ObjectClass` was constructed
//! as that class".
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │        Instrumented processes (producers, caplog-common)        │
//! └───────────────────────┬──────────────────────────────────────────┘
//!                         │ framed TCP stream, or files
//!                         ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        caplog (this crate)                       │
//! │                                                                  │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────┐              │
//! │  │   Server   │──▶│   Ingest   │──▶│ Reconstruct  │              │
//! │  │ (readers)  │   │  (frames,  │   │ (fragments,  │              │
//! │  └────────────┘   │  classify) │   │  stacks)     │              │
//! │                   └────────────┘   └──────┬───────┘              │
//! │                                           ▼                      │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────┐              │
//! │  │   Output   │◀──│ Processing │──▶│  Validation  │              │
//! │  │ (run dir)  │   │ (pipeline) │   │ (behavior    │              │
//! │  └────────────┘   └────────────┘   │  tree)       │              │
//! │                                    └──────────────┘              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`ingest`]: frame decoding, line classification, identifier remapping
//! - [`reconstruct`]: long-line reassembly, event arena, per-thread stacks
//! - [`validation`]: behavior-tree nodes, resolvers, object class state, rule files
//! - [`processing`]: the [`processing::Pipeline`] run object and report rendering
//! - [`server`]: tokio accept loop, per-connection readers, worker threads
//! - [`output`]: working directory, blob store, run summary
//! - [`run`]: file mode and server mode from start to `summary.json`
//! - [`cli`] / [`config`] / [`preflight`]: command line to validated configuration
//! - [`domain`]: id newtypes and error enums
//!
//! ## Key Concepts
//!
//! - **Source**: one connection or input file; lines are numbered per source
//! - **Fragment**: piece of a line longer than the producer's `MAX-CHAR-SIZE`
//! - **Arena**: append-only event store; a long line reserves its slot on its
//!   first fragment so events keep arrival order
//! - **Recovery policy**: resync or quarantine a thread whose depth disagrees

pub mod cli;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod output;
pub mod preflight;
pub mod processing;
pub mod reconstruct;
pub mod run;
pub mod server;
pub mod validation;
