//! Crate-wide error types.

use thiserror::Error;

use crate::pid::ProcessId;

/// Raised by [`crate::config::Config::validate`] before the core ever
/// starts. A configuration error prevents initialization entirely; it
/// never surfaces once the scheduler is running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("num_cpu must be in 1..=128, got {0}")]
    NumCpuOutOfRange(u32),

    #[error("quantum_cycles must be >= 1, got {0}")]
    QuantumZero(u32),

    #[error("batch_process_freq must be >= 1, got {0}")]
    BatchProcessFreqZero(u32),

    #[error("{field} must be a power of two in [64, 65536], got {value}")]
    NotPowerOfTwoInRange { field: &'static str, value: u32 },

    #[error("max_overall_mem ({max_overall_mem}) must be a multiple of mem_per_frame ({mem_per_frame})")]
    NotMultipleOfFrameSize {
        max_overall_mem: u32,
        mem_per_frame: u32,
    },

    #[error("min_mem_per_proc ({min}) must be <= max_mem_per_proc ({max})")]
    MinGreaterThanMax { min: u32, max: u32 },

    #[error("min_ins ({min}) must be <= max_ins ({max})")]
    InsRangeInverted { min: u32, max: u32 },
}

/// Rejected at process submission time; never reaches the dispatch loop.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("memory_required ({0}) must be a power of two in [64, 65536]")]
    MemoryNotPowerOfTwo(u32),

    #[error("memory_required ({value}) out of configured range [{min}, {max}]")]
    MemoryOutOfRange { value: u32, min: u32, max: u32 },
}

/// Non-fatal core failures. These are always reflected in process or
/// counter state and logged; they never unwind the dispatch loop.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("backing store I/O error for pid {pid} vpn {vpn}: {source}")]
    BackingStoreIo {
        pid: ProcessId,
        vpn: u32,
        #[source]
        source: std::io::Error,
    },
}
