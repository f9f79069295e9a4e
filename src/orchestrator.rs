//! The single entry point external callers (a CLI, a config loader, a batch
//! workload generator — none of which live in this crate) use to validate
//! configuration, build processes, and drive the scheduler.
//!
//! Replaces the original's `GlobalScheduler` singleton (and the teacher's
//! own `lazy_static! SCHEDULER`) with ordinary owned construction, per
//! `spec.md` §9's Design Notes on singletons.

use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::{ConfigError, SubmitError};
use crate::memory::{BackingStore, MemoryManager};
use crate::pid::{ProcessId, ProcessIdGenerator};
use crate::process::{flatten_program, Instruction, Process};
use crate::scheduler::Scheduler;

/// Owns the process id generator, the memory manager, and the scheduler.
/// Constructed once per run.
pub struct Orchestrator {
    config: Config,
    pid_generator: ProcessIdGenerator,
    mm: Arc<MemoryManager>,
    scheduler: Arc<Mutex<Scheduler>>,
}

impl Orchestrator {
    /// Validates `config` and wires the memory manager and scheduler
    /// together. Returns the first validation failure, if any.
    pub fn new(config: Config, backing_store: Box<dyn BackingStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let mm = Arc::new(MemoryManager::new(&config, backing_store));
        let scheduler = Arc::new(Mutex::new(Scheduler::new(config.clone(), Arc::clone(&mm))));
        Ok(Self {
            config,
            pid_generator: ProcessIdGenerator::new(),
            mm,
            scheduler,
        })
    }

    /// Flattens `instructions` (see [`crate::process::flatten_program`]),
    /// builds a process from the result, and submits it to the scheduler.
    /// Rejects `memory_required` outside the configured range or not a
    /// power of two, before the process is ever registered. This is the
    /// registration boundary: `Process::instructions` is always flat by
    /// the time it reaches the interpreter, which never sees a `For`.
    pub fn submit_process(
        &self,
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        memory_required: u32,
    ) -> Result<ProcessId, SubmitError> {
        if !memory_required.is_power_of_two() {
            return Err(SubmitError::MemoryNotPowerOfTwo(memory_required));
        }
        if memory_required < self.config.min_mem_per_proc
            || memory_required > self.config.max_mem_per_proc
        {
            return Err(SubmitError::MemoryOutOfRange {
                value: memory_required,
                min: self.config.min_mem_per_proc,
                max: self.config.max_mem_per_proc,
            });
        }

        let pid = self.pid_generator.allocate();
        let mut process = Process::new(
            pid,
            name,
            flatten_program(instructions),
            memory_required,
            self.config.mem_per_frame,
        );
        self.mm.allocate_page_table(&self.config, &mut process);
        log::debug!("submitting pid {pid} ({memory_required} bytes)");
        self.scheduler.lock().unwrap().submit(process);
        Ok(pid)
    }

    pub fn start(&self) {
        log::info!("starting dispatch loop ({} core(s))", self.config.num_cpu);
        Scheduler::start(&self.scheduler);
    }

    pub fn stop(&self) {
        log::info!("stopping dispatch loop");
        Scheduler::stop(&self.scheduler);
    }

    /// One manual dispatch-loop iteration, for deterministic driving in
    /// tests. Not meant to be called alongside `start()`'s background
    /// thread.
    pub fn step_once(&self) {
        self.scheduler.lock().unwrap().step_once();
    }

    pub fn scheduler(&self) -> &Arc<Mutex<Scheduler>> {
        &self.scheduler
    }

    pub fn memory_manager(&self) -> &Arc<MemoryManager> {
        &self.mm
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
