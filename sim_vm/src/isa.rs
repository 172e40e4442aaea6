//! Instruction set
//!
//! Every instruction is one 16-bit word:
//!
//! ```text
//!  15      11 10  9   8   7  6  5        0
//! +----------+------+---+------+----------+
//! |  opcode  |  RD  | I |  RS  |  unused  |
//! +----------+------+---+------+----------+
//!                       |  ADDR / CONST   |
//!                       +-----------------+
//! ```
//!
//! `I` selects the immediate form of the arithmetic instructions. CONST is a
//! signed 8-bit value, ADDR an unsigned offset into the process partition.

use core_types::Word;
use serde::{Deserialize, Serialize};

const OPCODE_SHIFT: u32 = 11;
const RD_SHIFT: u32 = 9;
const IMMEDIATE_BIT: Word = 1 << 8;
const RS_SHIFT: u32 = 6;
const OPERAND_MASK: Word = 0xFF;

/// Operation selected by bits 15-11
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Load,
    Store,
    Add,
    AddC,
    Sub,
    SubC,
    And,
    Xor,
    Compl,
    Shl,
    Shla,
    Shr,
    Shra,
    Compr,
    GetStat,
    PutStat,
    Jump,
    JumpL,
    JumpE,
    JumpG,
    Call,
    Return,
    Read,
    Write,
    Halt,
    Noop,
}

impl Opcode {
    // Ordered by encoding.
    const ALL: [Opcode; 26] = [
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::AddC,
        Opcode::Sub,
        Opcode::SubC,
        Opcode::And,
        Opcode::Xor,
        Opcode::Compl,
        Opcode::Shl,
        Opcode::Shla,
        Opcode::Shr,
        Opcode::Shra,
        Opcode::Compr,
        Opcode::GetStat,
        Opcode::PutStat,
        Opcode::Jump,
        Opcode::JumpL,
        Opcode::JumpE,
        Opcode::JumpG,
        Opcode::Call,
        Opcode::Return,
        Opcode::Read,
        Opcode::Write,
        Opcode::Halt,
        Opcode::Noop,
    ];

    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.get(bits as usize).copied()
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Clock ticks one execution costs
    pub fn cost(self) -> u64 {
        match self {
            Opcode::Load | Opcode::Store | Opcode::Call | Opcode::Return => 4,
            _ => 1,
        }
    }
}

/// A decoded instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub rd: usize,
    pub immediate: bool,
    pub rs: usize,
    /// Bits 7-0 as an unsigned partition offset
    pub address: usize,
    /// Bits 7-0 as a signed constant
    pub constant: Word,
}

impl Instruction {
    /// Clock ticks this instruction costs; `loadi` never touches memory
    pub fn cost(&self) -> u64 {
        if self.opcode == Opcode::Load && self.immediate {
            1
        } else {
            self.opcode.cost()
        }
    }
}

/// Decodes one word, `None` if the opcode field names no instruction
pub fn decode(word: Word) -> Option<Instruction> {
    let word = word & 0xFFFF;
    let opcode = Opcode::from_bits((word >> OPCODE_SHIFT) as u8)?;
    let operand = word & OPERAND_MASK;
    Some(Instruction {
        opcode,
        rd: ((word >> RD_SHIFT) & 0b11) as usize,
        immediate: word & IMMEDIATE_BIT != 0,
        rs: ((operand >> RS_SHIFT) & 0b11) as usize,
        address: operand as usize,
        constant: operand as u8 as i8 as Word,
    })
}

/// Encodes one instruction word
///
/// `operand` is the low byte: RS in bits 7-6, or an address or constant.
pub fn encode(opcode: Opcode, rd: usize, immediate: bool, operand: u8) -> Word {
    let mut word = (opcode.bits() as Word) << OPCODE_SHIFT;
    word |= ((rd as Word) & 0b11) << RD_SHIFT;
    if immediate {
        word |= IMMEDIATE_BIT;
    }
    word | operand as Word
}

/// Places a source register in the operand byte
pub fn rs_operand(rs: usize) -> u8 {
    ((rs as u8) & 0b11) << RS_SHIFT
}
