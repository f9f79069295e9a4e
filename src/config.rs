//! Immutable configuration record.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scheduling policy. The dispatch loop is shared between the two; only
/// the quantum-expiry check differs (`spec.md` §9 Design Notes, Open
/// Question iv).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerKind {
    Fcfs,
    Rr,
}

/// Validated, immutable-after-init system configuration.
///
/// Constructed by the caller (a config-file loader external to this
/// crate) and checked with [`Config::validate`] before being handed to
/// [`crate::orchestrator::Orchestrator::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub num_cpu: u32,
    pub scheduler_kind: SchedulerKind,
    pub quantum_cycles: u32,
    pub batch_process_freq: u32,
    pub min_ins: u32,
    pub max_ins: u32,
    pub delays_per_exec: u32,
    pub max_overall_mem: u32,
    pub mem_per_frame: u32,
    pub min_mem_per_proc: u32,
    pub max_mem_per_proc: u32,
}

fn is_pow2_in_range(value: u32) -> bool {
    (64..=65536).contains(&value) && value.is_power_of_two()
}

impl Config {
    /// Checks every invariant from `spec.md` §3/§6. Returns the first
    /// violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=128).contains(&self.num_cpu) {
            return Err(ConfigError::NumCpuOutOfRange(self.num_cpu));
        }
        if self.quantum_cycles < 1 {
            return Err(ConfigError::QuantumZero(self.quantum_cycles));
        }
        if self.batch_process_freq < 1 {
            return Err(ConfigError::BatchProcessFreqZero(self.batch_process_freq));
        }
        if self.min_ins > self.max_ins {
            return Err(ConfigError::InsRangeInverted {
                min: self.min_ins,
                max: self.max_ins,
            });
        }
        for (field, value) in [
            ("max_overall_mem", self.max_overall_mem),
            ("mem_per_frame", self.mem_per_frame),
            ("min_mem_per_proc", self.min_mem_per_proc),
            ("max_mem_per_proc", self.max_mem_per_proc),
        ] {
            if !is_pow2_in_range(value) {
                return Err(ConfigError::NotPowerOfTwoInRange { field, value });
            }
        }
        if self.max_overall_mem % self.mem_per_frame != 0 {
            return Err(ConfigError::NotMultipleOfFrameSize {
                max_overall_mem: self.max_overall_mem,
                mem_per_frame: self.mem_per_frame,
            });
        }
        if self.min_mem_per_proc > self.max_mem_per_proc {
            return Err(ConfigError::MinGreaterThanMax {
                min: self.min_mem_per_proc,
                max: self.max_mem_per_proc,
            });
        }
        Ok(())
    }

    pub fn total_frames(&self) -> usize {
        (self.max_overall_mem / self.mem_per_frame) as usize
    }
}
