//! `Process`: state machine, symbol table, log, and page table.

pub mod instruction;
pub mod interpreter;

pub use instruction::{flatten_program, ExprPart, Instruction, Operand, PrintArg};
pub use interpreter::step;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::memory::PageTableEntry;
use crate::pid::ProcessId;
use crate::timestamp::Timestamp;

/// Maximum number of entries in a process's symbol table (`spec.md` §4.3).
pub const SYMBOL_TABLE_CAP: usize = 32;

/// The threshold below which a process gets no symbol table at all
/// (`spec.md` §3 invariants).
pub const MIN_MEM_FOR_SYMBOL_TABLE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Ready,
    Running,
    Sleeping,
    Blocked,
    Finished,
    Terminated,
}

/// One append-only process log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub core_id: i32,
    pub message: String,
}

/// Recorded when a process is terminated by a memory access violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationInfo {
    pub timestamp: Timestamp,
    pub offending_address: u32,
}

/// A process: its program, execution state, symbol table, and page table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pid: ProcessId,
    name: String,
    creation_timestamp: Timestamp,
    core_id: i32,
    state: ProcessState,
    instructions: Vec<Instruction>,
    pc: usize,
    delay_counter: u32,
    symbol_table: Option<HashMap<String, u16>>,
    memory_required: u32,
    page_count: u32,
    page_table: Vec<PageTableEntry>,
    logs: Vec<LogEntry>,
    termination_info: Option<TerminationInfo>,
}

impl Process {
    /// Builds a new, not-yet-scheduled process. `instructions` must
    /// already be flat (see [`flatten_program`]); building is an external
    /// concern, this crate only executes pre-built programs.
    pub fn new(
        pid: ProcessId,
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        memory_required: u32,
        frame_size: u32,
    ) -> Self {
        let page_count = memory_required.div_ceil(frame_size);
        let symbol_table = if memory_required >= MIN_MEM_FOR_SYMBOL_TABLE {
            Some(HashMap::new())
        } else {
            None
        };
        Self {
            pid,
            name: name.into(),
            creation_timestamp: Timestamp::now(),
            core_id: -1,
            state: ProcessState::Ready,
            instructions,
            pc: 0,
            delay_counter: 0,
            symbol_table,
            memory_required,
            page_count,
            page_table: Vec::new(),
            logs: Vec::new(),
            termination_info: None,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn creation_timestamp(&self) -> Timestamp {
        self.creation_timestamp
    }

    pub fn core_id(&self) -> i32 {
        self.core_id
    }

    pub fn set_core_id(&mut self, core_id: i32) {
        self.core_id = core_id;
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn has_remaining_instructions(&self) -> bool {
        self.pc < self.instructions.len()
    }

    /// `spec.md` §3: Finished iff `pc == |instructions|` and not Terminated.
    pub fn is_finished(&self) -> bool {
        self.state != ProcessState::Terminated && self.pc >= self.instructions.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ProcessState::Terminated
    }

    pub fn memory_required(&self) -> u32 {
        self.memory_required
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Sizes the page table to `page_count`, all entries non-present.
    /// Called by `MemoryManager::allocate_page_table`.
    pub fn size_page_table(&mut self) {
        self.page_table = vec![PageTableEntry::vacant(); self.page_count as usize];
    }

    pub fn page_table_entry(&self, vpn: u32) -> &PageTableEntry {
        &self.page_table[vpn as usize]
    }

    pub fn page_table_entry_mut(&mut self, vpn: u32) -> &mut PageTableEntry {
        &mut self.page_table[vpn as usize]
    }

    pub fn page_table_mut(&mut self) -> &mut [PageTableEntry] {
        &mut self.page_table
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    pub fn termination_info(&self) -> Option<TerminationInfo> {
        self.termination_info
    }

    pub fn add_log(&mut self, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: Timestamp::now(),
            core_id: self.core_id,
            message: message.into(),
        });
    }

    /// Auto-declares the variable with value 0 on first read
    /// (`spec.md` §4.3). No-op (returns 0) if this process has no symbol
    /// table at all.
    pub fn get_variable(&mut self, name: &str) -> u16 {
        match &mut self.symbol_table {
            Some(table) => *table.entry(name.to_string()).or_insert(0),
            None => 0,
        }
    }

    /// Clamps into `[0, 0xFFFF]` (trivially true for a `u16`) and drops
    /// the write silently if the table is absent, full, and `name` is new.
    pub fn set_variable(&mut self, name: &str, value: u16) {
        let Some(table) = &mut self.symbol_table else {
            return;
        };
        if !table.contains_key(name) && table.len() >= SYMBOL_TABLE_CAP {
            return;
        }
        table.insert(name.to_string(), value);
    }

    pub fn symbol_table_len(&self) -> usize {
        self.symbol_table.as_ref().map_or(0, HashMap::len)
    }

    pub fn delay_counter(&self) -> u32 {
        self.delay_counter
    }

    pub fn set_delay_counter(&mut self, ticks: u32) {
        self.delay_counter = ticks;
    }

    pub fn advance_pc(&mut self) {
        self.pc += 1;
    }

    pub fn mark_terminated_by_violation(&mut self, offending_address: u32) {
        self.termination_info = Some(TerminationInfo {
            timestamp: Timestamp::now(),
            offending_address,
        });
        self.state = ProcessState::Terminated;
    }
}
