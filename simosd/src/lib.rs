//! # SimOS Host Runtime
//!
//! This crate provides the host side of the SimOS simulator.
//!
//! ## Philosophy
//!
//! - **Host owns I/O**: the kernel never touches the terminal or the
//!   filesystem directly; it talks to sinks and stores the host provides
//! - **Deterministic mode is the only mode**: one logical clock, no threads
//!
//! ## Responsibilities
//!
//! The host runtime:
//! - Parses the launch arguments and the optional JSON config file
//! - Boots the virtual machine and the kernel
//! - Loads every program under the I/O root
//! - Runs the dispatch loop to completion and writes the reports

pub mod cli;
pub mod report;
pub mod runtime;

pub use cli::{parse_args, CliAction};
pub use report::FileReportSink;
pub use runtime::{HostConfigFile, HostRuntime, HostRuntimeConfig, HostRuntimeError};
