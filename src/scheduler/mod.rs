//! Dispatch loop: coordinates `CoreWorker`s under FCFS or RR, reaps
//! finished/terminated processes, and drives tick accounting (`spec.md`
//! §4.5).

pub mod core_worker;

pub use core_worker::{CoreSnapshot, CoreWorker};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{Config, SchedulerKind};
use crate::memory::MemoryManager;
use crate::pid::ProcessId;
use crate::process::{Process, ProcessState};

/// Nominal period of one dispatch-loop iteration (`spec.md` §4.5).
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Read-only tick accounting, `spec.md` §4.5/P8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct TickCounters {
    pub idle_ticks: u64,
    pub active_ticks: u64,
}

impl TickCounters {
    pub fn total_ticks(&self) -> u64 {
        self.idle_ticks + self.active_ticks
    }
}

/// Coordinates dispatch for a fixed set of cores under one [`SchedulerKind`].
///
/// Owns the process registry and ready queue (`spec.md` §5's shared-resource
/// (b)); the memory manager is a separate lock acquired only from inside
/// `step_once`, respecting the scheduler → memory-manager lock order.
pub struct Scheduler {
    config: Config,
    mm: Arc<MemoryManager>,
    processes: HashMap<ProcessId, Process>,
    ready_queue: VecDeque<ProcessId>,
    cores: Vec<CoreWorker>,
    counters: TickCounters,
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(config: Config, mm: Arc<MemoryManager>) -> Self {
        let cores = (0..config.num_cpu as i32).map(CoreWorker::new).collect();
        Self {
            config,
            mm,
            processes: HashMap::new(),
            ready_queue: VecDeque::new(),
            cores,
            counters: TickCounters::default(),
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
            handle: None,
        }
    }

    /// Enqueues `process` at the ready queue's tail and registers it.
    pub fn submit(&mut self, process: Process) {
        let pid = process.pid();
        self.processes.insert(pid, process);
        self.ready_queue.push_back(pid);
    }

    pub fn snapshot_processes(&self) -> Vec<Process> {
        self.processes.values().cloned().collect()
    }

    pub fn cores(&self) -> &[CoreWorker] {
        &self.cores
    }

    /// Read-only per-core reporting snapshot (`spec.md` §6), safe to hand
    /// to an external UI/report layer without exposing dispatch control.
    pub fn snapshot_cores(&self) -> Vec<CoreSnapshot> {
        self.cores.iter().map(CoreWorker::snapshot).collect()
    }

    pub fn counters(&self) -> TickCounters {
        self.counters
    }

    pub fn memory_manager(&self) -> &MemoryManager {
        &self.mm
    }

    /// Runs exactly one dispatch-loop iteration: reap/preempt, unblock,
    /// dispatch, tick (`spec.md` §4.5 steps 2-4). Driving this directly,
    /// with no background thread, is the deterministic path tests use.
    pub fn step_once(&mut self) {
        self.reap_and_preempt();
        self.unblock_ready_processes();
        self.dispatch_free_cores();
        self.tick_cores();
    }

    fn reap_and_preempt(&mut self) {
        for core in &mut self.cores {
            let Some(pid) = core.current() else { continue };
            let done = self
                .processes
                .get(&pid)
                .map(|p| p.is_finished() || p.is_terminated())
                .unwrap_or(true);

            if done {
                log::debug!("core {}: reaping pid {pid}", core.id());
                if let Some(process) = self.processes.get_mut(&pid) {
                    self.mm.free_process_pages(process);
                }
                core.clear();
                continue;
            }

            let quantum_expired = self.config.scheduler_kind == SchedulerKind::Rr
                && core.run_ticks() >= self.config.quantum_cycles;
            if quantum_expired {
                log::trace!("core {}: quantum expired for pid {pid}", core.id());
                if let Some(preempted_pid) = core.preempt(&mut self.processes) {
                    let requeue = self
                        .processes
                        .get(&preempted_pid)
                        .map(|p| p.state() == ProcessState::Ready)
                        .unwrap_or(false);
                    if requeue {
                        self.ready_queue.push_back(preempted_pid);
                    }
                }
            }
        }
    }

    fn unblock_ready_processes(&mut self) {
        for pid in self.mm.unblockable(&self.processes) {
            if let Some(process) = self.processes.get_mut(&pid) {
                log::debug!("unblocking pid {pid}: frame became available");
                process.set_state(ProcessState::Ready);
                self.ready_queue.push_back(pid);
            }
        }
    }

    fn dispatch_free_cores(&mut self) {
        for core in &mut self.cores {
            if !core.is_free() {
                continue;
            }
            while let Some(pid) = self.ready_queue.pop_front() {
                let Some(process) = self.processes.get_mut(&pid) else {
                    continue;
                };
                if process.state() != ProcessState::Ready {
                    // Stale entry: became Blocked/Terminated since enqueue.
                    continue;
                }
                log::trace!("core {}: dispatching pid {pid}", core.id());
                core.assign(pid, process);
                break;
            }
        }
    }

    fn tick_cores(&mut self) {
        for core in &mut self.cores {
            let had_process = !core.is_free();
            core.tick(&mut self.processes, &self.mm, self.config.delays_per_exec);
            if had_process {
                self.counters.active_ticks += 1;
            } else {
                self.counters.idle_ticks += 1;
            }
        }
    }

    /// Spawns the dispatch thread, calling `step_once` roughly every
    /// [`TICK_PERIOD`] until [`Scheduler::stop`] is called. Mirrors the
    /// original's `cv.wait_for(lock, TICK_PERIOD, ...)` poll loop.
    pub fn start(this: &Arc<Mutex<Scheduler>>) {
        let worker = Arc::clone(this);
        let shutdown = this.lock().unwrap().shutdown.clone();
        let handle = thread::spawn(move || loop {
            let (lock, cvar) = &*shutdown;
            let guard = lock.lock().unwrap();
            let (guard, _timeout) = cvar.wait_timeout(guard, TICK_PERIOD).unwrap();
            if *guard {
                break;
            }
            drop(guard);
            worker.lock().unwrap().step_once();
        });
        this.lock().unwrap().handle = Some(handle);
    }

    /// Idempotent: signals shutdown and joins the dispatch thread if one
    /// is running.
    pub fn stop(this: &Arc<Mutex<Scheduler>>) {
        let (shutdown, handle) = {
            let mut scheduler = this.lock().unwrap();
            *scheduler.shutdown.0.lock().unwrap() = true;
            scheduler.shutdown.1.notify_all();
            (scheduler.shutdown.clone(), scheduler.handle.take())
        };
        let _ = shutdown;
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
