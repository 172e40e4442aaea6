//! Machine state and the fetch/execute cycle

use crate::config::VmConfig;
use crate::isa::{self, Instruction, Opcode};
use core_types::{Partition, SharedMemory, Word};
use kernel_api::{
    stack_top, Burst, CpuContext, Duration, ExitStatus, Instant, Machine, ProcessIo,
    REGISTER_COUNT,
};

/// Condition bits of the status register
pub mod flags {
    use core_types::Word;

    pub const CARRY: Word = 1;
    pub const GREATER: Word = 1 << 1;
    pub const EQUAL: Word = 1 << 2;
    pub const LESS: Word = 1 << 3;
    pub const OVERFLOW: Word = 1 << 4;
}

/// Words pushed by `call`: pc, every register, sr
const CALL_FRAME_WORDS: usize = REGISTER_COUNT + 2;

fn low_bits(value: Word) -> u32 {
    (value as u32) & 0xFFFF
}

fn sign_extend(bits: u32) -> Word {
    bits as u16 as i16 as Word
}

/// The virtual machine
///
/// Holds exactly one resident context. The kernel swaps contexts in and out
/// through [`Machine::set_context`] and [`Machine::context`].
#[derive(Debug)]
pub struct VirtualMachine {
    config: VmConfig,
    memory: SharedMemory,
    registers: [Word; REGISTER_COUNT],
    pc: usize,
    sp: usize,
    sr: Word,
    partition: Partition,
    largest_stack: usize,
    clock: Instant,
    io: ProcessIo,
}

impl VirtualMachine {
    pub fn new(config: VmConfig) -> Self {
        let memory = SharedMemory::new(config.mem_size);
        let top = stack_top(config.mem_size);
        Self {
            config,
            memory,
            registers: [0; REGISTER_COUNT],
            pc: 0,
            sp: top,
            sr: 0,
            partition: Partition::empty(),
            largest_stack: top,
            clock: Instant::ZERO,
            io: ProcessIo::default(),
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Lowest address the stack may occupy
    pub fn stack_floor(&self) -> usize {
        self.memory.used()
    }

    fn tick(&mut self, ticks: u64) {
        self.clock += Duration::from_ticks(ticks);
    }

    /// Fetches, decodes and executes one instruction
    ///
    /// Returns `Some` when the instruction forces the burst to end.
    fn step(&mut self) -> Option<ExitStatus> {
        let word = match self.fetch() {
            Some(word) => word,
            None => {
                self.tick(1);
                return Some(ExitStatus::AddressOutOfBounds);
            }
        };
        self.pc += 1;

        let Some(inst) = isa::decode(word) else {
            self.tick(1);
            return Some(ExitStatus::InvalidOpcode);
        };
        self.tick(inst.cost());
        self.execute(inst)
    }

    fn fetch(&self) -> Option<Word> {
        if !self.partition.contains(self.pc) {
            return None;
        }
        self.memory.read(self.pc).ok()
    }

    fn execute(&mut self, inst: Instruction) -> Option<ExitStatus> {
        let rd = inst.rd;
        let a = self.reg(rd);
        match inst.opcode {
            Opcode::Load => {
                let value = if inst.immediate {
                    inst.constant
                } else {
                    match self.load(inst.address) {
                        Ok(value) => value,
                        Err(status) => return Some(status),
                    }
                };
                self.registers[rd] = value;
            }
            Opcode::Store => {
                if let Err(status) = self.store(inst.address, a) {
                    return Some(status);
                }
            }
            Opcode::Add => {
                let value = self.add(a, self.operand(&inst), 0);
                self.registers[rd] = value;
            }
            Opcode::AddC => {
                let value = self.add(a, self.operand(&inst), self.carry());
                self.registers[rd] = value;
            }
            Opcode::Sub => {
                let value = self.sub(a, self.operand(&inst), 0);
                self.registers[rd] = value;
            }
            Opcode::SubC => {
                let value = self.sub(a, self.operand(&inst), self.carry());
                self.registers[rd] = value;
            }
            Opcode::And => self.registers[rd] = a & self.operand(&inst),
            Opcode::Xor => self.registers[rd] = a ^ self.operand(&inst),
            Opcode::Compl => self.registers[rd] = !a,
            Opcode::Shl => {
                let bits = low_bits(a);
                self.set_flag(flags::CARRY, bits & 0x8000 != 0);
                self.registers[rd] = sign_extend(bits << 1);
            }
            Opcode::Shla => {
                let bits = low_bits(a);
                self.set_flag(flags::CARRY, bits & 0x4000 != 0);
                self.registers[rd] = sign_extend(((bits << 1) & 0x7FFF) | (bits & 0x8000));
            }
            Opcode::Shr => {
                let bits = low_bits(a);
                self.set_flag(flags::CARRY, bits & 1 != 0);
                self.registers[rd] = sign_extend(bits >> 1);
            }
            Opcode::Shra => {
                self.set_flag(flags::CARRY, a & 1 != 0);
                self.registers[rd] = a >> 1;
            }
            Opcode::Compr => {
                let b = self.operand(&inst);
                self.set_flag(flags::LESS, a < b);
                self.set_flag(flags::EQUAL, a == b);
                self.set_flag(flags::GREATER, a > b);
            }
            Opcode::GetStat => self.registers[rd] = self.sr,
            Opcode::PutStat => self.sr = a,
            Opcode::Jump => return self.jump(inst.address),
            Opcode::JumpL => return self.jump_if(flags::LESS, inst.address),
            Opcode::JumpE => return self.jump_if(flags::EQUAL, inst.address),
            Opcode::JumpG => return self.jump_if(flags::GREATER, inst.address),
            Opcode::Call => return self.call(inst.address).err(),
            Opcode::Return => return self.ret().err(),
            Opcode::Read => {
                self.registers[rd] = self.io.read().map(|v| sign_extend(low_bits(v))).unwrap_or(0);
                return Some(ExitStatus::Read);
            }
            Opcode::Write => {
                self.io.write(a);
                return Some(ExitStatus::Write);
            }
            Opcode::Halt => return Some(ExitStatus::Halt),
            Opcode::Noop => {}
        }
        None
    }

    fn reg(&self, index: usize) -> Word {
        sign_extend(low_bits(self.registers[index]))
    }

    fn operand(&self, inst: &Instruction) -> Word {
        if inst.immediate {
            inst.constant
        } else {
            self.reg(inst.rs)
        }
    }

    fn carry(&self) -> Word {
        self.sr & flags::CARRY
    }

    fn set_flag(&mut self, flag: Word, on: bool) {
        if on {
            self.sr |= flag;
        } else {
            self.sr &= !flag;
        }
    }

    fn add(&mut self, a: Word, b: Word, carry_in: Word) -> Word {
        let raw = low_bits(a) + low_bits(b) + carry_in as u32;
        let result = sign_extend(raw);
        self.set_flag(flags::CARRY, raw > 0xFFFF);
        self.set_flag(flags::OVERFLOW, a + b + carry_in != result);
        result
    }

    fn sub(&mut self, a: Word, b: Word, borrow_in: Word) -> Word {
        let borrow = low_bits(a) < low_bits(b) + borrow_in as u32;
        let raw = low_bits(a)
            .wrapping_sub(low_bits(b))
            .wrapping_sub(borrow_in as u32);
        let result = sign_extend(raw);
        self.set_flag(flags::CARRY, borrow);
        self.set_flag(flags::OVERFLOW, a - b - borrow_in != result);
        result
    }

    fn load(&self, address: usize) -> Result<Word, ExitStatus> {
        let physical = self
            .partition
            .translate(address)
            .map_err(|_| ExitStatus::AddressOutOfBounds)?;
        self.memory
            .read(physical)
            .map(|v| sign_extend(low_bits(v)))
            .map_err(|_| ExitStatus::AddressOutOfBounds)
    }

    fn store(&mut self, address: usize, value: Word) -> Result<(), ExitStatus> {
        let physical = self
            .partition
            .translate(address)
            .map_err(|_| ExitStatus::AddressOutOfBounds)?;
        self.memory
            .write(physical, value)
            .map_err(|_| ExitStatus::AddressOutOfBounds)
    }

    fn jump(&mut self, address: usize) -> Option<ExitStatus> {
        match self.partition.translate(address) {
            Ok(target) => {
                self.pc = target;
                None
            }
            Err(_) => Some(ExitStatus::AddressOutOfBounds),
        }
    }

    fn jump_if(&mut self, flag: Word, address: usize) -> Option<ExitStatus> {
        if self.sr & flag != 0 {
            self.jump(address)
        } else {
            None
        }
    }

    fn push(&mut self, value: Word) -> Result<(), ExitStatus> {
        if self.sp == 0 || self.sp < self.stack_floor() {
            return Err(ExitStatus::StackOverflow);
        }
        self.memory
            .write(self.sp, value)
            .map_err(|_| ExitStatus::StackOverflow)?;
        self.sp -= 1;
        self.largest_stack = self.largest_stack.min(self.sp);
        Ok(())
    }

    fn pop(&mut self) -> Result<Word, ExitStatus> {
        if self.stack_depth() == 0 {
            return Err(ExitStatus::StackUnderflow);
        }
        self.sp += 1;
        self.memory
            .read(self.sp)
            .map_err(|_| ExitStatus::StackUnderflow)
    }

    fn stack_depth(&self) -> usize {
        stack_top(self.memory.size()).saturating_sub(self.sp)
    }

    fn call(&mut self, address: usize) -> Result<(), ExitStatus> {
        let target = self
            .partition
            .translate(address)
            .map_err(|_| ExitStatus::AddressOutOfBounds)?;
        let lowest_slot = self.stack_floor() + CALL_FRAME_WORDS - 1;
        if self.sp < lowest_slot.max(CALL_FRAME_WORDS) {
            return Err(ExitStatus::StackOverflow);
        }

        self.push(self.pc as Word)?;
        for index in 0..REGISTER_COUNT {
            self.push(self.registers[index])?;
        }
        self.push(self.sr)?;
        self.pc = target;
        Ok(())
    }

    fn ret(&mut self) -> Result<(), ExitStatus> {
        if self.stack_depth() < CALL_FRAME_WORDS {
            return Err(ExitStatus::StackUnderflow);
        }

        self.sr = self.pop()?;
        for index in (0..REGISTER_COUNT).rev() {
            self.registers[index] = self.pop()?;
        }
        self.pc = self.pop()? as usize;
        Ok(())
    }
}

impl Machine for VirtualMachine {
    fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut SharedMemory {
        &mut self.memory
    }

    fn context(&self) -> CpuContext {
        CpuContext {
            registers: self.registers,
            pc: self.pc,
            sp: self.sp,
            sr: self.sr,
            partition: self.partition,
            largest_stack: self.largest_stack,
        }
    }

    fn set_context(&mut self, context: CpuContext) {
        self.registers = context.registers;
        self.pc = context.pc;
        self.sp = context.sp;
        self.sr = context.sr;
        self.partition = context.partition;
        self.largest_stack = context.largest_stack;
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
        let start = self.clock;
        let exit = loop {
            if let Some(exit) = self.step() {
                break exit;
            }
            if self.clock.duration_since(start).as_ticks() >= self.config.time_slice {
                break ExitStatus::TimeSliceExpired;
            }
        };
        self.sr = exit.encode(self.sr);
        Burst {
            exit: ExitStatus::decode(self.sr),
            elapsed: self.clock.duration_since(start),
        }
    }
}
