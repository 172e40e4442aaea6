//! Kernel error types

use core_types::MemoryError;
use thiserror::Error;

/// Errors that end a simulation run
///
/// Runtime faults raised by a program are not errors; they come back from
/// the machine as [`crate::ExitStatus`] values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Memory operation failed
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Process not present in the process table
    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    /// Persisting or restoring a stack snapshot failed
    #[error("Stack store error: {0}")]
    StackStore(String),

    /// Emitting a process or system report failed
    #[error("Report error: {0}")]
    Report(String),

    /// Loading a program failed
    #[error("Load error: {0}")]
    Load(String),

    /// The configured dispatch limit was reached before the run finished
    #[error("Dispatch limit of {0} reached")]
    DispatchLimitReached(u64),
}
