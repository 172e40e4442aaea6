//! # Core Types
//!
//! This crate defines the fundamental types shared by the SimOS crates.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: A process only touches memory through the
//!   [`Partition`] it was granted at load time.
//! - **Type safety first**: Process identities and words are distinct types.
//! - **One arena, many owners**: [`SharedMemory`] is a single fixed-size
//!   array; partitions are disjoint index ranges handed out contiguously.
//!
//! ## Key Types
//!
//! - [`ProcessId`]: Unique identifier for a simulated process
//! - [`Word`]: A machine word
//! - [`Partition`]: A `[base, limit)` range of shared memory
//! - [`SharedMemory`]: The machine memory arena

pub mod ids;
pub mod memory;

pub use ids::ProcessId;
pub use memory::{MemoryError, Partition, SharedMemory, Word};
