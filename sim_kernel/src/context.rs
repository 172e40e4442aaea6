//! Context transfer between a process descriptor and the machine

use crate::stack_store::StackSnapshot;
use crate::Kernel;
use core_types::ProcessId;
use kernel_api::{stack_top, KernelError, Machine};

impl<M: Machine> Kernel<M> {
    /// Makes `id` the resident process
    ///
    /// Charges the time since its wake marker as waiting, replays its saved
    /// stack from the top of memory downward and discards the saved copy.
    pub(crate) fn load_state(&mut self, id: ProcessId) -> Result<(), KernelError> {
        let now = self.machine.clock();
        let top = stack_top(self.machine.memory().size());
        let pcb = self
            .processes
            .get_mut(&id)
            .ok_or_else(|| KernelError::UnknownProcess(id.to_string()))?;

        pcb.wait_time += now.duration_since(pcb.wake_marker);

        let mut context = pcb.context.clone();
        if let Some(snapshot) = self.stacks.restore(pcb.name())? {
            context.sp = snapshot.replay(self.machine.memory_mut(), top)?;
            self.stacks.discard(pcb.name())?;
        }

        self.machine.set_context(context);
        self.machine.attach_io(std::mem::take(&mut pcb.io));
        Ok(())
    }

    /// Takes the resident process back out of the machine
    ///
    /// Persists the words between sp and the top of memory, then stores sp
    /// reset to the top since the next resident process reuses the region.
    pub(crate) fn save_state(&mut self, id: ProcessId) -> Result<(), KernelError> {
        let mut context = self.machine.context();
        let top = stack_top(self.machine.memory().size());
        let snapshot = StackSnapshot::capture(self.machine.memory(), context.sp, top)?;
        let io = self.machine.detach_io();

        let pcb = self
            .processes
            .get_mut(&id)
            .ok_or_else(|| KernelError::UnknownProcess(id.to_string()))?;
        if snapshot.is_empty() {
            self.stacks.discard(pcb.name())?;
        } else {
            self.stacks.save(pcb.name(), &snapshot)?;
        }

        context.sp = top;
        pcb.context = context;
        pcb.io = io;
        Ok(())
    }
}
