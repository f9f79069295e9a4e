//! End-to-end scenarios, driven tick by tick through the public API.
//!
//! Unless stated otherwise, every scenario uses `num_cpu=1`,
//! `mem_per_frame=64`, `max_overall_mem=128` (two frames),
//! `delays_per_exec=0`, `quantum_cycles=2`, round robin.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;

use cosimos::config::{Config, SchedulerKind};
use cosimos::memory::{MemoryBackingStore, MemoryManager};
use cosimos::orchestrator::Orchestrator;
use cosimos::pid::ProcessId;
use cosimos::process::{Instruction, Operand, Process, PrintArg};

fn config() -> Config {
    Config {
        num_cpu: 1,
        scheduler_kind: SchedulerKind::Rr,
        quantum_cycles: 2,
        batch_process_freq: 1,
        min_ins: 1,
        max_ins: 10,
        delays_per_exec: 0,
        max_overall_mem: 128,
        mem_per_frame: 64,
        min_mem_per_proc: 64,
        max_mem_per_proc: 128,
    }
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(config(), Box::new(MemoryBackingStore::default())).unwrap()
}

fn finished_logs(orch: &Orchestrator, pid: ProcessId) -> Vec<String> {
    orch.scheduler()
        .lock()
        .unwrap()
        .snapshot_processes()
        .into_iter()
        .find(|p| p.pid() == pid)
        .unwrap()
        .logs()
        .iter()
        .map(|l| l.message.clone())
        .collect()
}

/// S1: Basic arithmetic & print.
#[test]
fn s1_basic_arithmetic_and_print() {
    let orch = orchestrator();
    let program = vec![
        Instruction::Declare { var: "x".into(), value: 10 },
        Instruction::Add { dst: "y".into(), a: Operand::var("x"), b: Operand::imm(5) },
        Instruction::Print(PrintArg::Variable("y".into())),
    ];
    let pid = orch.submit_process("p1", program, 64).unwrap();

    for _ in 0..3 {
        orch.step_once();
    }

    let logs = finished_logs(&orch, pid);
    assert!(logs.iter().any(|l| l.ends_with("y = 10 + 5 -> 15")));
    assert!(logs.iter().any(|l| l.ends_with("Accessing variable 'y' with value 15")));

    {
        let scheduler = orch.scheduler().lock().unwrap();
        let snapshot = scheduler.snapshot_processes();
        assert!(snapshot.iter().find(|p| p.pid() == pid).unwrap().is_finished());
    }

    // One further tick lets the dispatch loop reap the finished process.
    orch.step_once();
    let scheduler = orch.scheduler().lock().unwrap();
    assert!(scheduler.cores()[0].is_free());
}

/// S2: Saturating add.
#[test]
fn s2_saturating_add() {
    let orch = orchestrator();
    let program = vec![
        Instruction::Declare { var: "a".into(), value: 65530 },
        Instruction::Add { dst: "b".into(), a: Operand::var("a"), b: Operand::imm(100) },
    ];
    let pid = orch.submit_process("p1", program, 64).unwrap();
    orch.step_once();
    orch.step_once();

    let scheduler = orch.scheduler().lock().unwrap();
    let mut snapshot = scheduler.snapshot_processes();
    let p = snapshot.iter_mut().find(|p| p.pid() == pid).unwrap();
    assert_eq!(p.get_variable("b"), 65535);
}

/// S3: Saturating sub.
#[test]
fn s3_saturating_sub() {
    let orch = orchestrator();
    let program = vec![Instruction::Sub {
        dst: "c".into(),
        a: Operand::imm(3),
        b: Operand::imm(10),
    }];
    let pid = orch.submit_process("p1", program, 64).unwrap();
    orch.step_once();

    let scheduler = orch.scheduler().lock().unwrap();
    let mut snapshot = scheduler.snapshot_processes();
    let p = snapshot.iter_mut().find(|p| p.pid() == pid).unwrap();
    assert_eq!(p.get_variable("c"), 0);
}

/// S4: Sleep. Tick 1 dispatches and executes SLEEP (logging once and
/// setting a 3-tick delay); ticks 2-4 only decrement the delay counter
/// while the process sits Sleeping; tick 5 runs PRINT and finishes.
#[test]
fn s4_sleep_then_print() {
    let orch = orchestrator();
    let program = vec![Instruction::Sleep(3), Instruction::Print(PrintArg::Hello)];
    let pid = orch.submit_process("p1", program, 64).unwrap();

    orch.step_once();
    assert_eq!(finished_logs(&orch, pid), vec!["SLEEP\t\tSleeping for 3 ticks"]);

    for _ in 0..3 {
        orch.step_once();
        assert_eq!(finished_logs(&orch, pid).len(), 1);
        let scheduler = orch.scheduler().lock().unwrap();
        let snapshot = scheduler.snapshot_processes();
        let p = snapshot.iter().find(|p| p.pid() == pid).unwrap();
        assert!(!p.is_finished());
    }

    orch.step_once();
    let logs = finished_logs(&orch, pid);
    assert_eq!(logs.len(), 2);
    assert!(logs[1].contains("Hello World from p1!"));

    let scheduler = orch.scheduler().lock().unwrap();
    let snapshot = scheduler.snapshot_processes();
    assert!(snapshot.iter().find(|p| p.pid() == pid).unwrap().is_finished());
}

/// S5: Access violation.
#[test]
fn s5_access_violation_terminates_only_the_faulting_process() {
    let orch = orchestrator();
    let bad = vec![Instruction::Write { addr: Operand::imm(0x00FF), value: Operand::imm(42) }];
    let good = vec![Instruction::Print(PrintArg::Hello)];
    let bad_pid = orch.submit_process("bad", bad, 64).unwrap();
    let good_pid = orch.submit_process("good", good, 64).unwrap();

    orch.step_once();

    let scheduler = orch.scheduler().lock().unwrap();
    let snapshot = scheduler.snapshot_processes();
    let bad_p = snapshot.iter().find(|p| p.pid() == bad_pid).unwrap();
    assert!(bad_p.is_terminated());
    assert_eq!(bad_p.termination_info().unwrap().offending_address, 0x00FF);

    // The other process was never touched by the violation.
    let good_p = snapshot.iter().find(|p| p.pid() == good_pid).unwrap();
    assert!(!good_p.is_terminated());
}

/// S6: FIFO eviction across two processes. Driven directly against
/// `MemoryManager` + a process registry, below the orchestrator/scheduler
/// layer, so the fault sequence is fully controlled.
#[test]
fn s6_fifo_eviction_across_two_processes() {
    let cfg = config();
    let mm = MemoryManager::new(&cfg, Box::new(MemoryBackingStore::default()));

    let mut p1 = Process::new(ProcessId::first(), "p1", vec![], 128, 64);
    mm.allocate_page_table(&cfg, &mut p1);
    let gen = cosimos::pid::ProcessIdGenerator::new();
    gen.allocate(); // keep ids distinct from p1's hand-assigned first()
    let p2_pid = gen.allocate();
    let mut p2 = Process::new(p2_pid, "p2", vec![], 64, 64);
    mm.allocate_page_table(&cfg, &mut p2);

    let pid1 = p1.pid();
    let mut processes = HashMap::new();
    processes.insert(pid1, p1);
    processes.insert(p2_pid, p2);

    // P1 writes VPN0 then VPN1: both frames now dirty and owned by P1.
    let phys0 = match mm.access_memory(&mut processes, pid1, 0, true).unwrap() {
        cosimos::memory::AccessOutcome::Resolved(addr) => addr,
        cosimos::memory::AccessOutcome::Blocked => panic!("unexpected block"),
    };
    mm.write_u16(phys0, 0xABCD);
    let phys64 = match mm.access_memory(&mut processes, pid1, 64, true).unwrap() {
        cosimos::memory::AccessOutcome::Resolved(addr) => addr,
        cosimos::memory::AccessOutcome::Blocked => panic!("unexpected block"),
    };
    mm.write_u16(phys64, 0x1111);

    // P2 writes its VPN0: no free frame remains, so P1's oldest frame
    // (VPN0, loaded first) is evicted.
    let p2_phys = match mm.access_memory(&mut processes, p2_pid, 0, true).unwrap() {
        cosimos::memory::AccessOutcome::Resolved(addr) => addr,
        cosimos::memory::AccessOutcome::Blocked => panic!("unexpected block"),
    };
    mm.write_u16(p2_phys, 0x2222);

    assert!(!processes[&pid1].page_table_entry(0).present);
    let counters = mm.counters();
    assert_eq!(counters.evictions_dirty, 1);
    assert_eq!(counters.pages_out, 1);

    let phys0_again = match mm.access_memory(&mut processes, pid1, 0, false).unwrap() {
        cosimos::memory::AccessOutcome::Resolved(addr) => addr,
        cosimos::memory::AccessOutcome::Blocked => panic!("unexpected block"),
    };
    assert_eq!(mm.read_u16(phys0_again), 0xABCD);
}

/// S7: Round-robin fairness across two four-instruction processes.
#[test]
fn s7_round_robin_fairness() {
    let orch = orchestrator();
    let program = || vec![Instruction::Print(PrintArg::Hello); 4];
    let pid1 = orch.submit_process("p1", program(), 64).unwrap();
    let pid2 = orch.submit_process("p2", program(), 64).unwrap();

    let expected = [pid1, pid1, pid2, pid2, pid1, pid1, pid2, pid2];
    for expected_pid in expected {
        orch.step_once();
        let scheduler = orch.scheduler().lock().unwrap();
        assert_eq!(scheduler.cores()[0].current(), Some(expected_pid));
    }
    orch.step_once();

    let scheduler = orch.scheduler().lock().unwrap();
    let snapshot = scheduler.snapshot_processes();
    assert!(snapshot.iter().find(|p| p.pid() == pid1).unwrap().is_finished());
    assert!(snapshot.iter().find(|p| p.pid() == pid2).unwrap().is_finished());
}

/// Builds a bounded, randomized instruction list: every instruction stays
/// within `memory_required` and the variable pool, so the process is
/// guaranteed to either finish or fault, never spin forever.
fn random_program(rng: &mut impl Rng, count: u32, memory_required: u32) -> Vec<Instruction> {
    const VARS: &[&str] = &["a", "b", "c", "d", "e"];
    let var = |rng: &mut dyn rand::RngCore| VARS[rng.gen_range(0..VARS.len())].to_string();
    let operand = |rng: &mut dyn rand::RngCore| -> Operand {
        if rng.gen_bool(0.5) {
            Operand::var(var(rng))
        } else {
            Operand::imm(rng.gen_range(0..1000))
        }
    };
    let addr = |rng: &mut dyn rand::RngCore| Operand::imm(rng.gen_range(0..memory_required - 1) as u16);

    (0..count)
        .map(|_| match rng.gen_range(0..6) {
            0 => Instruction::Declare { var: var(rng), value: rng.gen_range(0..1000) },
            1 => Instruction::Add { dst: var(rng), a: operand(rng), b: operand(rng) },
            2 => Instruction::Sub { dst: var(rng), a: operand(rng), b: operand(rng) },
            3 => Instruction::Print(PrintArg::Variable(var(rng))),
            4 => Instruction::Sleep(rng.gen_range(0..3)),
            _ => {
                if rng.gen_bool(0.5) {
                    Instruction::Write { addr: addr(rng), value: operand(rng) }
                } else {
                    Instruction::Read { dst: var(rng), addr: addr(rng) }
                }
            }
        })
        .collect()
}

/// Stress test: a handful of processes with randomized, in-bounds
/// instruction streams on a multi-core round-robin scheduler. Every
/// process must reach a terminal state (finished or terminated by a
/// violation) within a generous tick budget; nothing should ever stay
/// Ready/Running/Sleeping/Blocked forever.
#[test]
fn stress_random_workload_always_reaches_a_terminal_state() {
    let mut cfg = config();
    cfg.num_cpu = 2;
    cfg.quantum_cycles = 3;
    cfg.max_overall_mem = 1024;
    cfg.min_mem_per_proc = 64;
    cfg.max_mem_per_proc = 256;
    let orch = Orchestrator::new(cfg, Box::new(MemoryBackingStore::default())).unwrap();

    let mut rng = rand::thread_rng();
    let mem_choices = [64u32, 128, 256];
    let mut pids = Vec::new();
    for i in 0..6 {
        let memory_required = mem_choices[rng.gen_range(0..mem_choices.len())];
        let count = rng.gen_range(3..=8);
        let program = random_program(&mut rng, count, memory_required);
        let pid = orch
            .submit_process(format!("stress{i}"), program, memory_required)
            .unwrap();
        pids.push(pid);
    }

    const TICK_BUDGET: u32 = 2000;
    let mut settled = false;
    for _ in 0..TICK_BUDGET {
        orch.step_once();
        let scheduler = orch.scheduler().lock().unwrap();
        let snapshot = scheduler.snapshot_processes();
        if pids.iter().all(|pid| {
            let p = snapshot.iter().find(|p| p.pid() == *pid).unwrap();
            p.is_finished() || p.is_terminated()
        }) {
            settled = true;
            break;
        }
    }

    assert!(settled, "workload did not settle within the tick budget");
}
