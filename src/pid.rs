//! Process identifiers.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A monotonically increasing process identifier.
///
/// Stored as `NonZeroU64` so that `Option<ProcessId>` stays a single
/// machine word, mirroring `d7abi::process::ProcessId`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(NonZeroU64);

impl ProcessId {
    /// The first id ever issued by a registry.
    pub const fn first() -> Self {
        Self(unsafe { NonZeroU64::new_unchecked(1) })
    }

    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }

    fn next(self) -> Self {
        Self(NonZeroU64::new(self.0.get() + 1).expect("process id overflow"))
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

/// Issues process ids in increasing order. Owned explicitly by whichever
/// object registers processes (the orchestrator) rather than living as a
/// global singleton.
#[derive(Debug)]
pub struct ProcessIdGenerator {
    next: AtomicU64,
}

impl ProcessIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(ProcessId::first().as_u64()),
        }
    }

    /// Allocates and returns the next id, advancing the generator.
    pub fn allocate(&self) -> ProcessId {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        ProcessId(NonZeroU64::new(raw).expect("process id overflow"))
    }
}

impl Default for ProcessIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
