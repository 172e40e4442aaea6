//! # Simulated Virtual Machine
//!
//! A 16-bit register/stack machine that runs one process at a time on
//! behalf of the kernel.
//!
//! ## Model
//!
//! - Four general registers, a program counter, a stack pointer and a
//!   status register
//! - One shared memory array; each process executes inside its partition
//! - The stack lives above every loaded partition and grows downward
//! - A logical clock that advances by each instruction's cost
//!
//! The machine never decides where a process goes next. It runs one burst
//! and reports why it stopped through [`kernel_api::Machine::run`].

pub mod config;
pub mod isa;
pub mod vm;

pub use config::VmConfig;
pub use isa::{decode, encode, Instruction, Opcode};
pub use vm::{flags, VirtualMachine};
