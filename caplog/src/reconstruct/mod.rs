//! Reconstruction: long-line reassembly and per-thread call stacks

pub mod arena;
pub mod fragment;
pub mod stack;

pub use arena::{EventArena, EventPayload, Slot, StackEvent};
pub use fragment::{CompletedLine, FragmentAssembler, FragmentStart, FragmentStats, PendingFragment};
pub use stack::{Committed, LogicalLine, ReconstructStats, RecoveryPolicy, StackReconstructor};
