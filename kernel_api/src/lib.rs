//! # Kernel API
//!
//! This crate defines the interface between the SimOS kernel and the
//! virtual machine it schedules processes onto.
//!
//! ## Philosophy
//!
//! The machine provides **mechanisms**, the kernel decides **policy**:
//! - The machine executes one burst and says why it stopped
//! - The kernel decides where the process goes next
//! - Time is explicit: the clock moves only when something charges it
//!
//! ## Design Goals
//!
//! 1. **Testability**: Any [`Machine`] can be replaced by a scripted one
//! 2. **Explicitness**: Exit reasons are a tagged enum, never raw bits
//! 3. **Determinism**: No host clocks, no threads

pub mod error;
pub mod machine;
pub mod time;

pub use error::KernelError;
pub use machine::{
    stack_top, Burst, CpuContext, ExitStatus, Machine, ProcessIo, REGISTER_COUNT,
    STATUS_CODE_MASK, STATUS_CODE_SHIFT,
};
pub use time::{Duration, Instant};
