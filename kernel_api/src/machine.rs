//! Virtual machine surface
//!
//! The kernel drives a machine only through [`Machine`]: it loads a process
//! context, lets the machine run one burst, and reads back why the machine
//! yielded. The 3-bit return code in the status register is decoded once,
//! here, into [`ExitStatus`].

use crate::time::{Duration, Instant};
use core_types::{Partition, SharedMemory, Word};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of general-purpose registers
pub const REGISTER_COUNT: usize = 4;

/// Bit position of the return code in the status register
pub const STATUS_CODE_SHIFT: u32 = 5;

/// Mask selecting the return code bits (5-7) of the status register
pub const STATUS_CODE_MASK: Word = 0b111 << STATUS_CODE_SHIFT;

/// Why the machine yielded control back to the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitStatus {
    /// The burst used up its time slice
    TimeSliceExpired,
    /// The program executed `halt`
    Halt,
    /// A memory reference fell outside the process partition
    AddressOutOfBounds,
    /// A push ran into the top of the loaded partitions
    StackOverflow,
    /// A pop found the stack empty
    StackUnderflow,
    /// The fetched word does not name an instruction
    InvalidOpcode,
    /// The program issued a blocking read
    Read,
    /// The program issued a blocking write
    Write,
}

impl ExitStatus {
    /// Decodes a 3-bit return code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ExitStatus::TimeSliceExpired),
            1 => Some(ExitStatus::Halt),
            2 => Some(ExitStatus::AddressOutOfBounds),
            3 => Some(ExitStatus::StackOverflow),
            4 => Some(ExitStatus::StackUnderflow),
            5 => Some(ExitStatus::InvalidOpcode),
            6 => Some(ExitStatus::Read),
            7 => Some(ExitStatus::Write),
            _ => None,
        }
    }

    /// Returns the 3-bit return code
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::TimeSliceExpired => 0,
            ExitStatus::Halt => 1,
            ExitStatus::AddressOutOfBounds => 2,
            ExitStatus::StackOverflow => 3,
            ExitStatus::StackUnderflow => 4,
            ExitStatus::InvalidOpcode => 5,
            ExitStatus::Read => 6,
            ExitStatus::Write => 7,
        }
    }

    /// Extracts the return code from bits 5-7 of a status register
    pub fn decode(status_register: Word) -> Self {
        let code = ((status_register & STATUS_CODE_MASK) >> STATUS_CODE_SHIFT) as u8;
        // Three bits cover all eight codes.
        Self::from_code(code).unwrap_or(ExitStatus::InvalidOpcode)
    }

    /// Writes this return code into bits 5-7 of a status register
    pub fn encode(self, status_register: Word) -> Word {
        (status_register & !STATUS_CODE_MASK) | ((self.code() as Word) << STATUS_CODE_SHIFT)
    }

    /// Runtime faults are reported but do not terminate the process
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            ExitStatus::AddressOutOfBounds
                | ExitStatus::StackOverflow
                | ExitStatus::StackUnderflow
                | ExitStatus::InvalidOpcode
        )
    }

    /// Blocking I/O moves the process to the wait queue
    pub fn is_blocking_io(self) -> bool {
        matches!(self, ExitStatus::Read | ExitStatus::Write)
    }

    pub fn describe(self) -> &'static str {
        match self {
            ExitStatus::TimeSliceExpired => "time slice expired",
            ExitStatus::Halt => "halt",
            ExitStatus::AddressOutOfBounds => "address out of bounds",
            ExitStatus::StackOverflow => "stack overflow",
            ExitStatus::StackUnderflow => "stack underflow",
            ExitStatus::InvalidOpcode => "invalid opcode",
            ExitStatus::Read => "blocking read",
            ExitStatus::Write => "blocking write",
        }
    }
}

/// Saved CPU state of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuContext {
    pub registers: [Word; REGISTER_COUNT],
    /// Physical address of the next instruction
    pub pc: usize,
    /// Next free stack slot; the stack is empty at `mem_size - 1`
    pub sp: usize,
    pub sr: Word,
    pub partition: Partition,
    /// Lowest sp reached so far
    pub largest_stack: usize,
}

impl CpuContext {
    /// Fresh context for a program loaded into `partition`
    pub fn new(partition: Partition, mem_size: usize) -> Self {
        let top = stack_top(mem_size);
        Self {
            registers: [0; REGISTER_COUNT],
            pc: partition.base(),
            sp: top,
            sr: 0,
            partition,
            largest_stack: top,
        }
    }
}

/// Slot an empty stack points at
pub fn stack_top(mem_size: usize) -> usize {
    mem_size.saturating_sub(1)
}

/// Result of one execution burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub exit: ExitStatus,
    pub elapsed: Duration,
}

/// Input and output streams of one process
///
/// Owned by the process descriptor while the process is not resident and
/// handed to the machine between context load and save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessIo {
    input: VecDeque<Word>,
    output: Vec<Word>,
}

impl ProcessIo {
    /// Creates streams with the given pending input
    pub fn new(input: impl IntoIterator<Item = Word>) -> Self {
        Self {
            input: input.into_iter().collect(),
            output: Vec::new(),
        }
    }

    /// Consumes the next input word
    pub fn read(&mut self) -> Option<Word> {
        self.input.pop_front()
    }

    /// Appends a word to the output stream
    pub fn write(&mut self, value: Word) {
        self.output.push(value);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn output(&self) -> &[Word] {
        &self.output
    }
}

/// The surface a virtual machine exposes to the kernel
pub trait Machine {
    /// Shared machine memory
    fn memory(&self) -> &SharedMemory;

    fn memory_mut(&mut self) -> &mut SharedMemory;

    /// Snapshot of the resident CPU context
    fn context(&self) -> CpuContext;

    /// Makes `context` the resident CPU context
    fn set_context(&mut self, context: CpuContext);

    /// Hands a process's streams to the machine
    fn attach_io(&mut self, io: ProcessIo);

    /// Takes the resident process's streams back
    fn detach_io(&mut self) -> ProcessIo;

    /// Current logical clock
    fn clock(&self) -> Instant;

    /// Advances the clock without executing (idle, context switch)
    fn advance_clock(&mut self, delta: Duration);

    /// Executes until halt, fault, blocking I/O or the end of the time slice
    fn run(&mut self) -> Burst;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_round_trip_through_register() {
        let flags = 0b1_0101;
        for code in 0..8u8 {
            let status = ExitStatus::from_code(code).unwrap();
            let sr = status.encode(flags);
            assert_eq!(ExitStatus::decode(sr), status);
            assert_eq!(sr & !STATUS_CODE_MASK, flags);
        }
        assert_eq!(ExitStatus::from_code(8), None);
    }

    #[test]
    fn test_fault_classification() {
        assert!(ExitStatus::AddressOutOfBounds.is_fault());
        assert!(ExitStatus::InvalidOpcode.is_fault());
        assert!(!ExitStatus::Halt.is_fault());
        assert!(!ExitStatus::Read.is_fault());
        assert!(ExitStatus::Write.is_blocking_io());
        assert!(!ExitStatus::TimeSliceExpired.is_blocking_io());
    }

    #[test]
    fn test_fresh_context() {
        let partition = Partition::new(12, 20).unwrap();
        let ctx = CpuContext::new(partition, 256);
        assert_eq!(ctx.pc, 12);
        assert_eq!(ctx.sp, 255);
        assert_eq!(ctx.largest_stack, 255);
        assert_eq!(ctx.registers, [0; REGISTER_COUNT]);
    }

    #[test]
    fn test_process_io_streams() {
        let mut io = ProcessIo::new([4, 5]);
        assert_eq!(io.read(), Some(4));
        assert_eq!(io.pending_input(), 1);
        io.write(9);
        assert_eq!(io.output(), &[9]);
        assert_eq!(io.read(), Some(5));
        assert_eq!(io.read(), None);
    }
}
