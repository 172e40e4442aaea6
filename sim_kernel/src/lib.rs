//! # Simulated Kernel
//!
//! The process scheduler and execution-cycle controller of SimOS.
//!
//! ## Purpose
//!
//! The kernel multiplexes one virtual CPU between every loaded program:
//! - Loads object code into disjoint partitions of shared machine memory
//! - Keeps ready and wait queues and a single active slot
//! - Moves a process's context into the machine and back out again
//! - Routes each process by the reason its burst ended
//! - Accounts CPU, wait and I/O time per process and for the whole machine
//!
//! ## Philosophy
//!
//! **The machine provides mechanism, the kernel decides policy.**
//!
//! The kernel never interprets instructions. It drives any [`Machine`]
//! through load, run and save, and everything it knows about a burst comes
//! back as a decoded [`kernel_api::ExitStatus`]. Time is a logical clock,
//! so a run is fully deterministic and every intermediate state is
//! inspectable from tests.

pub mod accounting;
pub mod config;
mod context;
mod dispatch;
pub mod loader;
pub mod pcb;
pub mod scheduler;
pub mod stack_store;
pub mod test_utils;

pub use accounting::{
    MemoryReportSink, NullReportSink, ProcessReport, ReportSink, SystemStats, SystemSummary,
};
pub use config::{CachePolicy, KernelConfig};
pub use dispatch::StepOutcome;
pub use loader::{Loader, LoaderError, ProgramImage};
pub use pcb::ProcessDescriptor;
pub use scheduler::{Residency, ScheduleEvent, Scheduler, WaitEntry};
pub use stack_store::{FileStackStore, MemoryStackStore, StackSnapshot, StackStore};

use core_types::ProcessId;
use kernel_api::{CpuContext, Instant, KernelError, Machine, ProcessIo};
use services_logger::{LogEntry, LogLevel, LogSink, NullLogSink};
use std::collections::HashMap;

/// Kernel state
///
/// Owns the machine, the process table and the queues. Unlike a real
/// kernel, all of it is directly accessible for testing.
pub struct Kernel<M: Machine> {
    config: KernelConfig,
    machine: M,
    /// Live processes; a descriptor is removed once its report is emitted
    processes: HashMap<ProcessId, ProcessDescriptor>,
    scheduler: Scheduler,
    stats: SystemStats,
    stacks: Box<dyn StackStore>,
    log: Box<dyn LogSink>,
    reports: Box<dyn ReportSink>,
    dispatches: u64,
}

impl<M: Machine> Kernel<M> {
    /// Creates a kernel around `machine`
    ///
    /// Stacks are kept in memory and logs and reports are discarded until
    /// replaced with the `with_*` builders.
    pub fn new(machine: M, config: KernelConfig) -> Self {
        Self {
            config,
            machine,
            processes: HashMap::new(),
            scheduler: Scheduler::new(),
            stats: SystemStats::default(),
            stacks: Box::new(MemoryStackStore::new()),
            log: Box::new(NullLogSink),
            reports: Box::new(NullReportSink),
            dispatches: 0,
        }
    }

    pub fn with_stack_store(mut self, store: impl StackStore + 'static) -> Self {
        self.stacks = Box::new(store);
        self
    }

    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log = Box::new(sink);
        self
    }

    pub fn with_report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.reports = Box::new(sink);
        self
    }

    /// Loads one program and appends it to the ready queue
    ///
    /// The partition is sized to the object code and placed directly after
    /// the previously loaded program. Stack snapshots are keyed by name, so
    /// a name already held by a live process is rejected.
    pub fn load_image(&mut self, image: ProgramImage) -> Result<ProcessId, KernelError> {
        if image.object_code.is_empty() {
            return Err(KernelError::Load(format!(
                "{}: empty object code",
                image.name
            )));
        }
        if self.processes.values().any(|pcb| pcb.name() == image.name) {
            return Err(KernelError::Load(format!(
                "{}: name already loaded",
                image.name
            )));
        }

        let mem_size = self.machine.memory().size();
        let memory = self.machine.memory_mut();
        let partition = memory.allocate(image.object_code.len())?;
        memory.load(partition, &image.object_code)?;

        let pcb = ProcessDescriptor::new(
            image.name,
            CpuContext::new(partition, mem_size),
            ProcessIo::new(image.input),
        );
        let id = pcb.id();
        self.log(
            LogEntry::new(LogLevel::Info, "loaded")
                .with_source(pcb.name())
                .with_field("partition", partition),
        );
        self.processes.insert(id, pcb);
        self.scheduler.enqueue(id);
        Ok(id)
    }

    /// Sends an entry to the log sink
    pub fn log(&mut self, entry: LogEntry) {
        self.log.log(entry);
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn clock(&self) -> Instant {
        self.machine.clock()
    }

    pub fn stats(&self) -> &SystemStats {
        &self.stats
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Live process descriptor, `None` once the process has halted
    pub fn process(&self, id: ProcessId) -> Option<&ProcessDescriptor> {
        self.processes.get(&id)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn residency(&self, id: ProcessId) -> Option<Residency> {
        self.scheduler.residency(id)
    }

    /// Number of bursts dispatched so far
    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    fn descriptor_mut(&mut self, id: ProcessId) -> Result<&mut ProcessDescriptor, KernelError> {
        self.processes
            .get_mut(&id)
            .ok_or_else(|| KernelError::UnknownProcess(id.to_string()))
    }

    fn name_of(&self, id: ProcessId) -> String {
        self.processes
            .get(&id)
            .map(|pcb| pcb.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }
}
