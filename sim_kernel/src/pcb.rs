//! Process descriptors
//!
//! A [`ProcessDescriptor`] is the saved execution context and accounting
//! record for one program. It lives in the kernel's process table from load
//! until its halt report is emitted; the scheduler queues only hold its id.

use core_types::{Partition, ProcessId};
use kernel_api::{CpuContext, Duration, Instant, ProcessIo};

#[derive(Debug, Clone)]
pub struct ProcessDescriptor {
    id: ProcessId,
    name: String,
    /// Saved registers, pc, sp, sr, partition and stack marker
    pub(crate) context: CpuContext,
    /// Process streams; empty while the machine holds them
    pub(crate) io: ProcessIo,
    pub(crate) exec_time: Duration,
    pub(crate) wait_time: Duration,
    pub(crate) io_time: Duration,
    /// Clock value from which time spent queued counts as waiting
    pub(crate) wake_marker: Instant,
}

impl ProcessDescriptor {
    pub fn new(name: impl Into<String>, context: CpuContext, io: ProcessIo) -> Self {
        Self {
            id: ProcessId::new(),
            name: name.into(),
            context,
            io,
            exec_time: Duration::ZERO,
            wait_time: Duration::ZERO,
            io_time: Duration::ZERO,
            wake_marker: Instant::ZERO,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &CpuContext {
        &self.context
    }

    pub fn partition(&self) -> Partition {
        self.context.partition
    }

    pub fn io(&self) -> &ProcessIo {
        &self.io
    }

    pub fn exec_time(&self) -> Duration {
        self.exec_time
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    pub fn io_time(&self) -> Duration {
        self.io_time
    }

    pub fn wake_marker(&self) -> Instant {
        self.wake_marker
    }

    /// Deepest stack reached, in words
    pub fn largest_stack_size(&self, mem_size: usize) -> usize {
        mem_size
            .saturating_sub(self.context.largest_stack)
            .saturating_sub(1)
    }
}
