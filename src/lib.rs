//! Core of a multi-core process scheduler: FCFS/round-robin dispatch, a
//! demand-paged virtual memory manager with FIFO eviction, and a tiny
//! per-process instruction interpreter.
//!
//! This crate is the simulation core only. Loading configuration from
//! disk, generating workloads, formatting reports, and any terminal UI
//! are the responsibility of a host binary built on top of
//! [`orchestrator::Orchestrator`].

pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod pid;
pub mod process;
pub mod scheduler;
pub mod timestamp;

pub use config::{Config, SchedulerKind};
pub use error::{ConfigError, CoreError, SubmitError};
pub use memory::MemoryCounters;
pub use orchestrator::Orchestrator;
pub use pid::{ProcessId, ProcessIdGenerator};
pub use scheduler::{CoreSnapshot, TickCounters};
pub use timestamp::Timestamp;
