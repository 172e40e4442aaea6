//! Test utilities
//!
//! [`ScriptedMachine`] implements [`Machine`] by replaying bursts that a test
//! writes down in advance, so the dispatch loop can be driven through every
//! exit status without assembling programs.

use core_types::{Partition, SharedMemory, Word};
use kernel_api::{
    stack_top, Burst, CpuContext, Duration, ExitStatus, Instant, Machine, ProcessIo,
};
use std::collections::{HashMap, VecDeque};

/// One scripted execution burst
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedBurst {
    pub exit: ExitStatus,
    pub elapsed: u64,
    /// Words pushed onto the stack during the burst
    pub push: Vec<Word>,
    /// Word written to the process output during the burst
    pub write: Option<Word>,
}

impl ScriptedBurst {
    pub fn new(exit: ExitStatus, elapsed: u64) -> Self {
        Self {
            exit,
            elapsed,
            push: Vec::new(),
            write: None,
        }
    }

    pub fn pushing(mut self, words: Vec<Word>) -> Self {
        self.push = words;
        self
    }

    pub fn writing(mut self, word: Word) -> Self {
        self.write = Some(word);
        self
    }
}

/// What the machine saw when a burst started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// Partition base of the resident process
    pub base: usize,
    pub sp: usize,
    /// Stack words from the top of memory down to sp
    pub stack: Vec<Word>,
    pub clock: Instant,
}

/// A machine that replays scripts keyed by partition base
///
/// A process whose script has run out halts after one tick.
#[derive(Debug)]
pub struct ScriptedMachine {
    memory: SharedMemory,
    context: CpuContext,
    io: ProcessIo,
    clock: Instant,
    scripts: HashMap<usize, VecDeque<ScriptedBurst>>,
    runs: Vec<RunRecord>,
}

impl ScriptedMachine {
    pub fn new(mem_size: usize) -> Self {
        Self {
            memory: SharedMemory::new(mem_size),
            context: CpuContext::new(Partition::empty(), mem_size),
            io: ProcessIo::default(),
            clock: Instant::ZERO,
            scripts: HashMap::new(),
            runs: Vec::new(),
        }
    }

    /// Scripts the process loaded at `base`
    pub fn with_script(mut self, base: usize, bursts: Vec<ScriptedBurst>) -> Self {
        self.scripts.insert(base, bursts.into());
        self
    }

    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    fn top(&self) -> usize {
        stack_top(self.memory.size())
    }
}

impl Machine for ScriptedMachine {
    fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut SharedMemory {
        &mut self.memory
    }

    fn context(&self) -> CpuContext {
        self.context.clone()
    }

    fn set_context(&mut self, context: CpuContext) {
        self.context = context;
    }

    fn attach_io(&mut self, io: ProcessIo) {
        self.io = io;
    }

    fn detach_io(&mut self) -> ProcessIo {
        std::mem::take(&mut self.io)
    }

    fn clock(&self) -> Instant {
        self.clock
    }

    fn advance_clock(&mut self, delta: Duration) {
        self.clock += delta;
    }

    fn run(&mut self) -> Burst {
        let base = self.context.partition.base();
        let top = self.top();
        let stack = (self.context.sp + 1..=top)
            .rev()
            .filter_map(|address| self.memory.read(address).ok())
            .collect();
        self.runs.push(RunRecord {
            base,
            sp: self.context.sp,
            stack,
            clock: self.clock,
        });

        let burst = self
            .scripts
            .get_mut(&base)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| ScriptedBurst::new(ExitStatus::Halt, 1));

        for word in &burst.push {
            if self.memory.write(self.context.sp, *word).is_err() {
                break;
            }
            self.context.sp = self.context.sp.saturating_sub(1);
            self.context.largest_stack = self.context.largest_stack.min(self.context.sp);
        }
        if let Some(word) = burst.write {
            self.io.write(word);
        }

        let elapsed = Duration::from_ticks(burst.elapsed);
        self.clock += elapsed;
        self.context.sr = burst.exit.encode(self.context.sr);
        Burst {
            exit: burst.exit,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscripted_process_halts() {
        let mut machine = ScriptedMachine::new(8);
        let burst = machine.run();
        assert_eq!(burst.exit, ExitStatus::Halt);
        assert_eq!(machine.clock(), Instant::from_ticks(1));
    }

    #[test]
    fn test_script_pushes_and_encodes_status() {
        let mut machine = ScriptedMachine::new(8).with_script(
            0,
            vec![ScriptedBurst::new(ExitStatus::Write, 3)
                .pushing(vec![4, 5])
                .writing(9)],
        );
        machine.attach_io(ProcessIo::default());

        let burst = machine.run();
        assert_eq!(burst.exit, ExitStatus::Write);
        assert_eq!(ExitStatus::decode(machine.context().sr), ExitStatus::Write);
        assert_eq!(machine.context().sp, 5);
        assert_eq!(machine.memory().read(7), Ok(4));
        assert_eq!(machine.detach_io().output(), &[9]);
    }
}
