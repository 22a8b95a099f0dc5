//! Instruction walker for method bodies
//!
//! Decodes just enough of each instruction to know its length, so call
//! sites can be located without misreading operand bytes as opcodes.

use crate::error::ClassFileError;

pub const INVOKESTATIC: u8 = 0xB8;

const TABLESWITCH: u8 = 0xAA;
const LOOKUPSWITCH: u8 = 0xAB;
const WIDE: u8 = 0xC4;
const IINC: u8 = 0x84;

/// One decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub opcode: u8,
    pub len: usize,
}

/// Fixed length of an opcode, `None` for the variable-length ones and
/// for opcodes that never appear in a valid class file
fn fixed_length(opcode: u8) -> Option<usize> {
    let len = match opcode {
        // bipush, ldc, loads/stores with an index, ret, newarray
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3A | 0xA9 | 0xBC => 2,
        // sipush, ldc_w, ldc2_w, iinc, branches, field/method refs, new,
        // anewarray, checkcast, instanceof, ifnull, ifnonnull
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xA8 | 0xB2..=0xB8 | 0xBB | 0xBD | 0xC0 | 0xC1 | 0xC6
        | 0xC7 => 3,
        // multianewarray
        0xC5 => 4,
        // invokeinterface, invokedynamic, goto_w, jsr_w
        0xB9 | 0xBA | 0xC8 | 0xC9 => 5,
        0x00..=0x0F | 0x1A..=0x35 | 0x3B..=0x83 | 0x85..=0x98 | 0xAC..=0xB1 | 0xBE | 0xBF | 0xC2
        | 0xC3 => 1,
        _ => return None,
    };
    Some(len)
}

fn read_i32(code: &[u8], at: usize, pc: usize) -> Result<i32, ClassFileError> {
    code.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(i32::from_be_bytes)
        .ok_or(ClassFileError::TruncatedInstruction { pc })
}

/// Length of the instruction at `pc`
pub fn instruction_length(code: &[u8], pc: usize) -> Result<usize, ClassFileError> {
    let opcode = *code
        .get(pc)
        .ok_or(ClassFileError::TruncatedInstruction { pc })?;

    let len = match opcode {
        TABLESWITCH | LOOKUPSWITCH => {
            // Operands start at the next 4-byte boundary of the code array
            let padding = (4 - ((pc + 1) % 4)) % 4;
            let operands = pc + 1 + padding;
            let (header, count, entry_size) = if opcode == TABLESWITCH {
                let low = read_i32(code, operands + 4, pc)?;
                let high = read_i32(code, operands + 8, pc)?;
                (12, i64::from(high) - i64::from(low) + 1, 4)
            } else {
                let pairs = read_i32(code, operands + 4, pc)?;
                (8, i64::from(pairs), 8)
            };
            switch_length(padding + header, count, entry_size)
                .ok_or(ClassFileError::TruncatedInstruction { pc })?
        }
        WIDE => match code.get(pc + 1) {
            Some(&IINC) => 6,
            Some(_) => 4,
            None => return Err(ClassFileError::TruncatedInstruction { pc }),
        },
        _ => fixed_length(opcode).ok_or(ClassFileError::UnknownOpcode { opcode, pc })?,
    };

    match pc.checked_add(len) {
        Some(end) if end <= code.len() => Ok(len),
        _ => Err(ClassFileError::TruncatedInstruction { pc }),
    }
}

/// Opcode byte + padding + header + `count` entries, or `None` if the
/// count is negative or the size does not fit in `usize`
fn switch_length(fixed: usize, count: i64, entry_size: usize) -> Option<usize> {
    usize::try_from(count)
        .ok()?
        .checked_mul(entry_size)?
        .checked_add(1 + fixed)
}

/// Iterator over the instructions of a code array
///
/// Stops after the first error.
pub struct Instructions<'a> {
    code: &'a [u8],
    pc: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            pc: 0,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, ClassFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pc >= self.code.len() {
            return None;
        }

        match instruction_length(self.code, self.pc) {
            Ok(len) => {
                let insn = Instruction {
                    pc: self.pc,
                    opcode: self.code[self.pc],
                    len,
                };
                self.pc += len;
                Some(Ok(insn))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Every `invokestatic` in `code` as (pc, constant pool index)
pub fn invokestatic_sites(code: &[u8]) -> Result<Vec<(usize, u16)>, ClassFileError> {
    let mut sites = Vec::new();
    for insn in Instructions::new(code) {
        let insn = insn?;
        if insn.opcode == INVOKESTATIC {
            let index = u16::from_be_bytes([code[insn.pc + 1], code[insn.pc + 2]]);
            sites.push((insn.pc, index));
        }
    }
    Ok(sites)
}

/// Point the `invokestatic` at `pc` to a different constant pool entry
pub fn patch_invokestatic(code: &mut [u8], pc: usize, index: u16) -> Result<(), ClassFileError> {
    match code.get_mut(pc..pc + 3) {
        Some([INVOKESTATIC, hi, lo]) => {
            let [new_hi, new_lo] = index.to_be_bytes();
            *hi = new_hi;
            *lo = new_lo;
            Ok(())
        }
        _ => Err(ClassFileError::TruncatedInstruction { pc }),
    }
}
