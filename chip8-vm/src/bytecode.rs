//! Helpers for extracting data from opcodes, and decoding them into instructions.
use std::fmt::{self, Display, Formatter};

use crate::constants::*;

/// Read the big-endian instruction word at the cursor.
///
/// The cursor wraps around the 12-bit address space.
#[inline(always)]
pub fn fetch(ram: &[u8], cursor: usize) -> u16 {
    let a = ram[cursor & ADDRESS_MASK] as u16;
    let b = ram[(cursor + 1) & ADDRESS_MASK] as u16;
    (a << 8) | b
}

/// Extract the instruction class from the upper nibble.
#[inline(always)]
pub fn op_code(word: u16) -> u8 {
    ((word & 0xF000) >> 12) as u8
}

/// Extract operand X, the register in the second nibble.
#[inline(always)]
pub fn op_x(word: u16) -> u8 {
    ((word & 0x0F00) >> 8) as u8
}

/// Extract operand Y, the register in the third nibble.
#[inline(always)]
pub fn op_y(word: u16) -> u8 {
    ((word & 0x00F0) >> 4) as u8
}

/// Extract operand N, the last nibble.
#[inline(always)]
pub fn op_n(word: u16) -> u8 {
    (word & 0x000F) as u8
}

/// Extract operand NN, the lower byte.
#[inline(always)]
pub fn op_nn(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Extract operand NNN, the lower 12 bits.
#[inline(always)]
pub fn op_nnn(word: u16) -> Address {
    word & 0x0FFF
}

/// Decoded instruction.
///
/// Register operands are indices into the register file, always below 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1nnn
    Jp(Address),
    /// 2nnn
    Call(Address),
    /// 3xnn
    SeByte(u8, u8),
    /// 4xnn
    SneByte(u8, u8),
    /// 5xy0
    SeReg(u8, u8),
    /// 6xnn
    LdByte(u8, u8),
    /// 7xnn
    AddByte(u8, u8),
    /// 8xy0
    LdReg(u8, u8),
    /// 8xy1
    Or(u8, u8),
    /// 8xy2
    And(u8, u8),
    /// 8xy3
    Xor(u8, u8),
    /// 8xy4
    AddReg(u8, u8),
    /// 8xy5
    Sub(u8, u8),
    /// 8xy6
    Shr(u8, u8),
    /// 8xy7
    Subn(u8, u8),
    /// 8xyE
    Shl(u8, u8),
    /// 9xy0
    SneReg(u8, u8),
    /// Annn
    LdI(Address),
    /// Bnnn
    JpV0(Address),
    /// Cxnn
    Rnd(u8, u8),
    /// Dxyn
    Drw(u8, u8, u8),
    /// Ex9E
    Skp(u8),
    /// ExA1
    Sknp(u8),
    /// Fx07
    LdVxDt(u8),
    /// Fx0A
    LdVxK(u8),
    /// Fx15
    LdDtVx(u8),
    /// Fx18
    LdStVx(u8),
    /// Fx1E
    AddI(u8),
    /// Fx29
    LdF(u8),
    /// Fx33
    LdB(u8),
    /// Fx55
    LdIVx(u8),
    /// Fx65
    LdVxI(u8),
}

impl Instr {
    /// Decode an instruction word.
    ///
    /// Returns `None` when the word does not match a known bit pattern.
    pub fn decode(word: u16) -> Option<Self> {
        use Instr::*;

        let (x, y, n, nn, nnn) = (op_x(word), op_y(word), op_n(word), op_nn(word), op_nnn(word));

        let instr = match op_code(word) {
            0x0 => match word {
                0x00E0 => Cls,
                0x00EE => Ret,
                // 0nnn machine code routines are not supported.
                _ => return None,
            },
            0x1 => Jp(nnn),
            0x2 => Call(nnn),
            0x3 => SeByte(x, nn),
            0x4 => SneByte(x, nn),
            0x5 if n == 0 => SeReg(x, y),
            0x6 => LdByte(x, nn),
            0x7 => AddByte(x, nn),
            // Arithmetic instructions indentified by n
            0x8 => match n {
                0x0 => LdReg(x, y),
                0x1 => Or(x, y),
                0x2 => And(x, y),
                0x3 => Xor(x, y),
                0x4 => AddReg(x, y),
                0x5 => Sub(x, y),
                0x6 => Shr(x, y),
                0x7 => Subn(x, y),
                0xE => Shl(x, y),
                _ => return None,
            },
            0x9 if n == 0 => SneReg(x, y),
            0xA => LdI(nnn),
            0xB => JpV0(nnn),
            0xC => Rnd(x, nn),
            0xD => Drw(x, y, n),
            0xE => match nn {
                0x9E => Skp(x),
                0xA1 => Sknp(x),
                _ => return None,
            },
            0xF => match nn {
                0x07 => LdVxDt(x),
                0x0A => LdVxK(x),
                0x15 => LdDtVx(x),
                0x18 => LdStVx(x),
                0x1E => AddI(x),
                0x29 => LdF(x),
                0x33 => LdB(x),
                0x55 => LdIVx(x),
                0x65 => LdVxI(x),
                _ => return None,
            },
            _ => return None,
        };

        Some(instr)
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use Instr::*;

        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(nnn) => write!(f, "JP {nnn:03X}"),
            Call(nnn) => write!(f, "CALL {nnn:03X}"),
            SeByte(x, nn) => write!(f, "SE V{x:X}, {nn:02X}"),
            SneByte(x, nn) => write!(f, "SNE V{x:X}, {nn:02X}"),
            SeReg(x, y) => write!(f, "SE V{x:X}, V{y:X}"),
            LdByte(x, nn) => write!(f, "LD V{x:X}, {nn:02X}"),
            AddByte(x, nn) => write!(f, "ADD V{x:X}, {nn:02X}"),
            LdReg(x, y) => write!(f, "LD V{x:X}, V{y:X}"),
            Or(x, y) => write!(f, "OR V{x:X}, V{y:X}"),
            And(x, y) => write!(f, "AND V{x:X}, V{y:X}"),
            Xor(x, y) => write!(f, "XOR V{x:X}, V{y:X}"),
            AddReg(x, y) => write!(f, "ADD V{x:X}, V{y:X}"),
            Sub(x, y) => write!(f, "SUB V{x:X}, V{y:X}"),
            Shr(x, y) => write!(f, "SHR V{x:X}, V{y:X}"),
            Subn(x, y) => write!(f, "SUBN V{x:X}, V{y:X}"),
            Shl(x, y) => write!(f, "SHL V{x:X}, V{y:X}"),
            SneReg(x, y) => write!(f, "SNE V{x:X}, V{y:X}"),
            LdI(nnn) => write!(f, "LD I, {nnn:03X}"),
            JpV0(nnn) => write!(f, "JP V0, {nnn:03X}"),
            Rnd(x, nn) => write!(f, "RND V{x:X}, {nn:02X}"),
            Drw(x, y, n) => write!(f, "DRW V{x:X}, V{y:X}, {n:X}"),
            Skp(x) => write!(f, "SKP V{x:X}"),
            Sknp(x) => write!(f, "SKNP V{x:X}"),
            LdVxDt(x) => write!(f, "LD V{x:X}, DT"),
            LdVxK(x) => write!(f, "LD V{x:X}, K"),
            LdDtVx(x) => write!(f, "LD DT, V{x:X}"),
            LdStVx(x) => write!(f, "LD ST, V{x:X}"),
            AddI(x) => write!(f, "ADD I, V{x:X}"),
            LdF(x) => write!(f, "LD F, V{x:X}"),
            LdB(x) => write!(f, "LD B, V{x:X}"),
            LdIVx(x) => write!(f, "LD [I], V{x:X}"),
            LdVxI(x) => write!(f, "LD V{x:X}, [I]"),
        }
    }
}
