//! Scenario Test Utilities
//!
//! This crate provides shared utilities for end-to-end scheduling tests: a
//! real virtual machine, a kernel with in-memory sinks, and programs
//! assembled from source.
//!
//! ## Test Philosophy
//!
//! - **Whole system**: programs are assembled and executed, not scripted
//! - **Deterministic**: same sources + same config => same clock values
//! - **Invariants first**: every scenario checks queue membership and time
//!   conservation, not just final output

use assembler::assemble;
use core_types::ProcessId;
use kernel_api::KernelError;
use services_logger::{LogLevel, MemoryLogSink};
use sim_kernel::{
    Kernel, KernelConfig, MemoryReportSink, MemoryStackStore, ProcessReport, ProgramImage,
    ScheduleEvent, SystemSummary,
};
use sim_vm::{VirtualMachine, VmConfig};

/// A kernel on a real machine with every sink observable
pub struct TestSystem {
    pub kernel: Kernel<VirtualMachine>,
    pub logs: MemoryLogSink,
    pub reports: MemoryReportSink,
    pub stacks: MemoryStackStore,
    loaded: Vec<ProcessId>,
}

impl TestSystem {
    pub fn new(vm: VmConfig, config: KernelConfig) -> Self {
        let logs = MemoryLogSink::new();
        let reports = MemoryReportSink::new();
        let stacks = MemoryStackStore::new();
        let kernel = Kernel::new(VirtualMachine::new(vm), config)
            .with_log_sink(logs.clone())
            .with_report_sink(reports.clone())
            .with_stack_store(stacks.clone());
        Self {
            kernel,
            logs,
            reports,
            stacks,
            loaded: Vec::new(),
        }
    }

    /// Default machine with the given time slice
    pub fn with_time_slice(time_slice: u64) -> Self {
        Self::new(
            VmConfig {
                time_slice,
                ..VmConfig::default()
            },
            KernelConfig::default(),
        )
    }

    /// Assembles and loads a program
    pub fn load(&mut self, name: &str, source: &str) -> Result<ProcessId, String> {
        self.load_with_input(name, source, Vec::new())
    }

    pub fn load_with_input(
        &mut self,
        name: &str,
        source: &str,
        input: Vec<i32>,
    ) -> Result<ProcessId, String> {
        let code = assemble(source).map_err(|e| format!("{}: {}", name, e))?;
        let id = self
            .kernel
            .load_image(ProgramImage::new(name, code).with_input(input))
            .map_err(|e| e.to_string())?;
        self.loaded.push(id);
        Ok(id)
    }

    pub fn loaded(&self) -> &[ProcessId] {
        &self.loaded
    }

    pub fn run(&mut self) -> Result<SystemSummary, KernelError> {
        self.kernel.run()
    }

    pub fn report(&self, name: &str) -> Option<ProcessReport> {
        self.reports.report(name)
    }

    /// Audit events of one process, in order
    pub fn events_for(&self, id: ProcessId) -> Vec<ScheduleEvent> {
        self.kernel
            .scheduler()
            .audit_log()
            .iter()
            .filter(|event| event.id() == id)
            .cloned()
            .collect()
    }

    /// Processes in the order they were selected
    pub fn selections(&self) -> Vec<ProcessId> {
        self.kernel
            .scheduler()
            .audit_log()
            .iter()
            .filter_map(|event| match event {
                ScheduleEvent::Selected { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Error log lines naming `name`
    pub fn error_lines(&self, name: &str) -> usize {
        self.logs
            .count(|entry| entry.level == LogLevel::Error && entry.source.as_deref() == Some(name))
    }

    /// Number of places `id` currently occupies among ready, waiting,
    /// active and terminated
    pub fn memberships(&self, id: ProcessId) -> usize {
        let scheduler = self.kernel.scheduler();
        scheduler.ready().filter(|&other| other == id).count()
            + scheduler.waiting().filter(|entry| entry.id == id).count()
            + usize::from(scheduler.active() == Some(id))
            + scheduler.terminated().iter().filter(|&&other| other == id).count()
    }
}

/// Source of a program that runs for exactly `ticks` ticks then halts
pub fn compute_program(ticks: usize) -> String {
    let mut source = "noop\n".repeat(ticks.saturating_sub(1));
    source.push_str("halt\n");
    source
}

/// Calls a subroutine that clobbers r0 and spins for `spins` iterations,
/// then writes r0, which `return` must have restored to `value`
pub fn call_and_spin_program(value: i32, spins: i32) -> String {
    format!(
        "\
loadi 0 {value}
loadi 1 9
call 5
write 0
halt
loadi 0 0     ! subroutine
loadi 2 {spins}
subi 2 1
compri 2 0
jumpg 7
return
"
    )
}
