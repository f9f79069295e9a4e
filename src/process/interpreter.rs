//! The per-process instruction interpreter: `step` executes at most one
//! instruction per call, per `spec.md` §4.3's seven-step contract.

use std::collections::HashMap;

use crate::memory::{AccessOutcome, MemoryManager, OutOfBounds};
use crate::pid::ProcessId;
use crate::process::instruction::{ExprPart, Instruction, Operand, PrintArg};
use crate::process::{Process, ProcessState};

enum StepOutcome {
    /// The instruction ran to completion; `0` delay value returned.
    Completed(u32),
    /// A memory access had no frame available; the process is now
    /// `Blocked` and `pc` must not advance.
    Blocked,
    /// The instruction terminated the process (memory violation).
    Terminated,
}

fn resolve_operand(process: &mut Process, operand: &Operand) -> u16 {
    match operand {
        Operand::Var(name) => process.get_variable(name),
        Operand::Imm(value) => *value,
    }
}

fn format_print(process: &mut Process, arg: &PrintArg) -> String {
    match arg {
        PrintArg::Hello => format!("PRINT\t\tHello World from {}!", process.name()),
        PrintArg::Literal(text) => format!("PRINT\t\t{text}"),
        PrintArg::Variable(name) => {
            let value = process.get_variable(name);
            format!("PRINT\t\tAccessing variable '{name}' with value {value}")
        }
        PrintArg::Expression(parts) => {
            let mut body = String::new();
            for part in parts {
                match part {
                    ExprPart::Literal(text) => body.push_str(text),
                    ExprPart::Variable(name) => {
                        let value = process.get_variable(name);
                        body.push_str(&value.to_string());
                    }
                }
            }
            format!("PRINT\t\t{body}")
        }
    }
}

fn execute_instruction(
    pid: ProcessId,
    processes: &mut HashMap<ProcessId, Process>,
    mm: &MemoryManager,
    instr: &Instruction,
) -> StepOutcome {
    match instr {
        Instruction::Declare { var, value } => {
            let process = processes.get_mut(&pid).expect("process vanished mid-step");
            process.set_variable(var, *value);
            process.add_log(format!("DECLARE\t{var} = {value}"));
            StepOutcome::Completed(0)
        }
        Instruction::Add { dst, a, b } => {
            let process = processes.get_mut(&pid).expect("process vanished mid-step");
            let v1 = resolve_operand(process, a);
            let v2 = resolve_operand(process, b);
            let result = ((v1 as u32) + (v2 as u32)).min(u16::MAX as u32) as u16;
            process.set_variable(dst, result);
            process.add_log(format!("ADD\t\t{dst} = {v1} + {v2} -> {result}"));
            StepOutcome::Completed(0)
        }
        Instruction::Sub { dst, a, b } => {
            let process = processes.get_mut(&pid).expect("process vanished mid-step");
            let v1 = resolve_operand(process, a);
            let v2 = resolve_operand(process, b);
            let result = v1.saturating_sub(v2);
            process.set_variable(dst, result);
            process.add_log(format!("SUBTRACT\t{dst} = {v1} - {v2} -> {result}"));
            StepOutcome::Completed(0)
        }
        Instruction::Print(arg) => {
            let process = processes.get_mut(&pid).expect("process vanished mid-step");
            let message = format_print(process, arg);
            process.add_log(message);
            StepOutcome::Completed(0)
        }
        Instruction::Sleep(ticks) => {
            let process = processes.get_mut(&pid).expect("process vanished mid-step");
            process.add_log(format!("SLEEP\t\tSleeping for {ticks} ticks"));
            StepOutcome::Completed(*ticks as u32)
        }
        Instruction::Read { dst, addr } => {
            let virtual_addr = {
                let process = processes.get_mut(&pid).expect("process vanished mid-step");
                resolve_operand(process, addr) as u32
            };
            match mm.access_memory(processes, pid, virtual_addr, false) {
                Err(OutOfBounds) => {
                    log::warn!("pid {pid}: access violation reading {virtual_addr:#x}");
                    let process = processes.get_mut(&pid).expect("process vanished mid-step");
                    process.mark_terminated_by_violation(virtual_addr);
                    StepOutcome::Terminated
                }
                Ok(AccessOutcome::Blocked) => StepOutcome::Blocked,
                Ok(AccessOutcome::Resolved(physical_addr)) => {
                    let value = mm.read_u16(physical_addr);
                    let process = processes.get_mut(&pid).expect("process vanished mid-step");
                    process.set_variable(dst, value);
                    process.add_log(format!(
                        "READ\t\taddress {virtual_addr:#x} with value {value} and stored as {dst}"
                    ));
                    StepOutcome::Completed(0)
                }
            }
        }
        Instruction::Write { addr, value } => {
            let (virtual_addr, value_to_write) = {
                let process = processes.get_mut(&pid).expect("process vanished mid-step");
                let virtual_addr = resolve_operand(process, addr) as u32;
                let value_to_write = resolve_operand(process, value);
                (virtual_addr, value_to_write)
            };
            match mm.access_memory(processes, pid, virtual_addr, true) {
                Err(OutOfBounds) => {
                    log::warn!("pid {pid}: access violation writing {virtual_addr:#x}");
                    let process = processes.get_mut(&pid).expect("process vanished mid-step");
                    process.mark_terminated_by_violation(virtual_addr);
                    StepOutcome::Terminated
                }
                Ok(AccessOutcome::Blocked) => StepOutcome::Blocked,
                Ok(AccessOutcome::Resolved(physical_addr)) => {
                    mm.write_u16(physical_addr, value_to_write);
                    let process = processes.get_mut(&pid).expect("process vanished mid-step");
                    process.add_log(format!(
                        "WRITE\t\tvalue {value_to_write} to address {virtual_addr:#x}"
                    ));
                    StepOutcome::Completed(0)
                }
            }
        }
        Instruction::For { .. } => {
            unreachable!("For instructions are flattened before submission")
        }
    }
}

/// Executes at most one instruction for `pid`, per `spec.md` §4.3:
///
/// 1. No remaining instructions: no-op.
/// 2. `delay_counter > 0`: go Sleeping, decrement, return.
/// 3. Otherwise go Running and fetch `instructions[pc]`.
/// 4. Execute it.
/// 5. A termination leaves `pc` untouched.
/// 6. Otherwise advance `pc` and set `delay_counter := max(delays_per_exec, r)`.
pub fn step(
    pid: ProcessId,
    processes: &mut HashMap<ProcessId, Process>,
    mm: &MemoryManager,
    delays_per_exec: u32,
) {
    let Some(process) = processes.get_mut(&pid) else {
        return;
    };
    if !process.has_remaining_instructions() {
        return;
    }
    if process.delay_counter() > 0 {
        process.set_state(ProcessState::Sleeping);
        let remaining = process.delay_counter() - 1;
        process.set_delay_counter(remaining);
        return;
    }
    process.set_state(ProcessState::Running);
    let instr = process.instructions()[process.pc()].clone();

    if let StepOutcome::Completed(r) = execute_instruction(pid, processes, mm, &instr) {
        let process = processes.get_mut(&pid).expect("process vanished mid-step");
        process.advance_pc();
        process.set_delay_counter(delays_per_exec.max(r));
    }
}
