//! # Assembler
//!
//! Turns textual programs into object code for the simulated machine.
//!
//! ## Source format
//!
//! One instruction per line:
//!
//! ```text
//! loadi 0 12      ! r0 = 12
//! addi  0 -1
//! compri 0 0
//! jumpg 1
//! halt
//! 7               ! a bare integer is emitted as a data word
//! ```
//!
//! Everything after `!` is a comment. Registers are 0-3, addresses 0-255 and
//! constants -128..127.
//!
//! ## Object code
//!
//! One decimal integer per line, see [`write_object_code`] and
//! [`parse_object_code`].

use core_types::Word;
use sim_vm::isa::{encode, rs_operand, Opcode};
use std::str::SplitWhitespace;
use thiserror::Error;

const REGISTER_MAX: i64 = 3;
const ADDRESS_MAX: i64 = 255;
const CONST_MIN: i64 = -128;
const CONST_MAX: i64 = 127;
const DATA_MIN: i64 = -32768;
const DATA_MAX: i64 = 32767;

/// Assembly errors, each carrying the 1-based source line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: '{mnemonic}' is missing an operand")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("line {line}: unexpected operand '{operand}'")]
    UnexpectedOperand { line: usize, operand: String },

    #[error("line {line}: invalid register {value}")]
    InvalidRegister { line: usize, value: i64 },

    #[error("line {line}: {value} outside {min}..={max}")]
    OutOfRange {
        line: usize,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },
}

/// Malformed object code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectCodeError {
    #[error("object line {line}: invalid word '{token}'")]
    InvalidWord { line: usize, token: String },
}

/// Operand shape of a mnemonic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operands {
    /// `RD ADDR`
    RegisterAddress,
    /// `RD CONST`, immediate bit set
    RegisterConstant,
    /// `RD RS`
    RegisterRegister,
    /// `RD`
    Register,
    /// `ADDR`
    Address,
    Bare,
}

fn lookup(mnemonic: &str) -> Option<(Opcode, Operands)> {
    use Operands::*;
    let entry = match mnemonic {
        "load" => (Opcode::Load, RegisterAddress),
        "loadi" => (Opcode::Load, RegisterConstant),
        "store" => (Opcode::Store, RegisterAddress),
        "add" => (Opcode::Add, RegisterRegister),
        "addi" => (Opcode::Add, RegisterConstant),
        "addc" => (Opcode::AddC, RegisterRegister),
        "addci" => (Opcode::AddC, RegisterConstant),
        "sub" => (Opcode::Sub, RegisterRegister),
        "subi" => (Opcode::Sub, RegisterConstant),
        "subc" => (Opcode::SubC, RegisterRegister),
        "subci" => (Opcode::SubC, RegisterConstant),
        "and" => (Opcode::And, RegisterRegister),
        "andi" => (Opcode::And, RegisterConstant),
        "xor" => (Opcode::Xor, RegisterRegister),
        "xori" => (Opcode::Xor, RegisterConstant),
        "compl" => (Opcode::Compl, Register),
        "shl" => (Opcode::Shl, Register),
        "shla" => (Opcode::Shla, Register),
        "shr" => (Opcode::Shr, Register),
        "shra" => (Opcode::Shra, Register),
        "compr" => (Opcode::Compr, RegisterRegister),
        "compri" => (Opcode::Compr, RegisterConstant),
        "getstat" => (Opcode::GetStat, Register),
        "putstat" => (Opcode::PutStat, Register),
        "jump" => (Opcode::Jump, Address),
        "jumpl" => (Opcode::JumpL, Address),
        "jumpe" => (Opcode::JumpE, Address),
        "jumpg" => (Opcode::JumpG, Address),
        "call" => (Opcode::Call, Address),
        "return" => (Opcode::Return, Bare),
        "read" => (Opcode::Read, Register),
        "write" => (Opcode::Write, Register),
        "halt" => (Opcode::Halt, Bare),
        "noop" => (Opcode::Noop, Bare),
        _ => return None,
    };
    Some(entry)
}

/// Assembles a whole source text into object code
pub fn assemble(source: &str) -> Result<Vec<Word>, AssembleError> {
    let mut words = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let code = raw.split('!').next().unwrap_or("");
        let mut tokens = code.split_whitespace();
        let Some(head) = tokens.next() else {
            continue;
        };
        words.push(assemble_line(index + 1, head, tokens)?);
    }
    Ok(words)
}

fn assemble_line(
    line: usize,
    head: &str,
    mut tokens: SplitWhitespace<'_>,
) -> Result<Word, AssembleError> {
    if looks_numeric(head) {
        let value = ranged(line, head, DATA_MIN, DATA_MAX)?;
        reject_trailing(line, &mut tokens)?;
        return Ok(value as Word);
    }

    let mnemonic = head.to_ascii_lowercase();
    let (opcode, shape) = lookup(&mnemonic).ok_or_else(|| AssembleError::UnknownMnemonic {
        line,
        mnemonic: head.to_string(),
    })?;
    let mut operand = || next_operand(line, &mnemonic, &mut tokens);

    let word = match shape {
        Operands::RegisterAddress => {
            let rd = register(line, operand()?)?;
            let address = ranged(line, operand()?, 0, ADDRESS_MAX)?;
            encode(opcode, rd, false, address as u8)
        }
        Operands::RegisterConstant => {
            let rd = register(line, operand()?)?;
            let constant = ranged(line, operand()?, CONST_MIN, CONST_MAX)?;
            encode(opcode, rd, true, constant as i8 as u8)
        }
        Operands::RegisterRegister => {
            let rd = register(line, operand()?)?;
            let rs = register(line, operand()?)?;
            encode(opcode, rd, false, rs_operand(rs))
        }
        Operands::Register => {
            let rd = register(line, operand()?)?;
            encode(opcode, rd, false, 0)
        }
        Operands::Address => {
            let address = ranged(line, operand()?, 0, ADDRESS_MAX)?;
            encode(opcode, 0, false, address as u8)
        }
        Operands::Bare => encode(opcode, 0, false, 0),
    };

    reject_trailing(line, &mut tokens)?;
    Ok(word)
}

fn next_operand<'a>(
    line: usize,
    mnemonic: &str,
    tokens: &mut SplitWhitespace<'a>,
) -> Result<&'a str, AssembleError> {
    tokens.next().ok_or_else(|| AssembleError::MissingOperand {
        line,
        mnemonic: mnemonic.to_string(),
    })
}

fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    digits.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn number(line: usize, token: &str) -> Result<i64, AssembleError> {
    token.parse::<i64>().map_err(|_| AssembleError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

fn ranged(line: usize, token: &str, min: i64, max: i64) -> Result<i64, AssembleError> {
    let value = number(line, token)?;
    if value < min || value > max {
        return Err(AssembleError::OutOfRange {
            line,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn register(line: usize, token: &str) -> Result<usize, AssembleError> {
    let value = number(line, token)?;
    if !(0..=REGISTER_MAX).contains(&value) {
        return Err(AssembleError::InvalidRegister { line, value });
    }
    Ok(value as usize)
}

fn reject_trailing(
    line: usize,
    tokens: &mut SplitWhitespace<'_>,
) -> Result<(), AssembleError> {
    match tokens.next() {
        Some(extra) => Err(AssembleError::UnexpectedOperand {
            line,
            operand: extra.to_string(),
        }),
        None => Ok(()),
    }
}

/// Renders object code, one word per line
pub fn write_object_code(words: &[Word]) -> String {
    let mut text = String::with_capacity(words.len() * 6);
    for word in words {
        text.push_str(&word.to_string());
        text.push('\n');
    }
    text
}

/// Parses object code, skipping blank lines
pub fn parse_object_code(text: &str) -> Result<Vec<Word>, ObjectCodeError> {
    text.lines()
        .enumerate()
        .filter(|(_, raw)| !raw.trim().is_empty())
        .map(|(index, raw)| {
            let token = raw.trim();
            token.parse::<Word>().map_err(|_| ObjectCodeError::InvalidWord {
                line: index + 1,
                token: token.to_string(),
            })
        })
        .collect()
}
