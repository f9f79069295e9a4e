//! A single logical CPU: binds at most one process and steps it once per
//! tick (`spec.md` §4.4).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryManager;
use crate::pid::ProcessId;
use crate::process::{interpreter, Process, ProcessState};

/// Read-only per-core reporting snapshot (`spec.md` §6's "per-core binding
/// and run-ticks"). Unlike [`CoreWorker`] itself, this is safe to hand to an
/// external reporting layer: it carries no ability to mutate dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    pub id: i32,
    pub current: Option<ProcessId>,
    pub run_ticks: u32,
}

#[derive(Debug)]
pub struct CoreWorker {
    id: i32,
    current: Option<ProcessId>,
    run_ticks: u32,
}

impl CoreWorker {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            current: None,
            run_ticks: 0,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn current(&self) -> Option<ProcessId> {
        self.current
    }

    pub fn is_free(&self) -> bool {
        self.current.is_none()
    }

    /// Binds `pid`; idempotent until `clear`/`preempt`.
    pub fn assign(&mut self, pid: ProcessId, process: &mut Process) {
        process.set_core_id(self.id);
        process.set_state(ProcessState::Running);
        self.current = Some(pid);
        self.run_ticks = 0;
    }

    /// If the bound process is not finished, sets it `Ready`, clears its
    /// `core_id`, detaches it, and returns its pid; marks this core free.
    pub fn preempt(&mut self, processes: &mut HashMap<ProcessId, Process>) -> Option<ProcessId> {
        let pid = self.current.take()?;
        if let Some(process) = processes.get_mut(&pid) {
            if !process.is_finished() && !process.is_terminated() {
                process.set_state(ProcessState::Ready);
            }
            process.set_core_id(-1);
        }
        Some(pid)
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.run_ticks = 0;
    }

    /// Steps the bound process by one instruction and bumps `run_ticks`.
    /// No-op if no process is bound.
    pub fn tick(
        &mut self,
        processes: &mut HashMap<ProcessId, Process>,
        mm: &MemoryManager,
        delays_per_exec: u32,
    ) {
        if let Some(pid) = self.current {
            interpreter::step(pid, processes, mm, delays_per_exec);
            self.run_ticks += 1;
        }
    }

    pub fn run_ticks(&self) -> u32 {
        self.run_ticks
    }

    pub fn reset_run_ticks(&mut self) {
        self.run_ticks = 0;
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            id: self.id,
            current: self.current,
            run_ticks: self.run_ticks,
        }
    }
}
