// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{Error, regs::Reg};

/// Jump distance that ends the program successfully.
pub const JP_EXIT_OK: i32 = 0xFFFF;
/// Jump distance that ends the program with [Error::ExitFailure].
pub const JP_EXIT_ERR: i32 = 0xFFFE;

/// Instruction kind.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Op {
    /// Transfer `len` bytes.
    /// `src` is transmitted (zeros, if absent), `dst` receives (discarded, if absent).
    /// If `reg` is set, its value is added to the `src` and `dst` offsets.
    Transfer = 0,
    /// As [Op::Transfer], but toggle the select line first.
    /// With `len = 0` only the toggle is done.
    /// A transfer that fails the bounds check does not toggle.
    TransferSel,
    /// Load 32 bit word into `reg`.
    /// From `src`, if present.
    /// Otherwise clock in 4 bytes into `dst` or, if absent, into `reg`.
    Ld,
    /// Load `reg` from the register with the id in `src`.
    Ldr,
    /// Load 16 bit half word. Otherwise like [Op::Ld].
    Lds,
    /// Store `reg` as 32 bit word to the memory in `src`.
    /// Otherwise clock out the 4 register bytes.
    Sto,
    /// Store the low 16 bits of `reg`. Otherwise like [Op::Sto].
    Stos,
    /// `reg += len`
    Add,
    /// `reg &= src`
    And,
    /// `reg >>= len`
    Shr,
    /// `reg <<= len`
    Shl,
    /// Branch to the program in `src` and run `len` instructions from there.
    B,
    /// Branch, if `reg` is zero.
    Bz,
    /// Branch, if `reg` is not zero.
    Bnz,
    /// Relative jump by `len` instructions, or exit with [JP_EXIT_OK] / [JP_EXIT_ERR].
    J,
    /// Jump, if `reg & src` is zero. The mask defaults to all ones.
    Jz,
    /// Jump, if `reg & src` is not zero.
    Jnz,
    /// Peripheral unlock computation on `reg`.
    Unlock,
}

impl Op {
    /// Number of defined instruction kinds.
    pub const COUNT: u8 = 18;
}

impl TryFrom<u8> for Op {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Transfer,
            1 => Self::TransferSel,
            2 => Self::Ld,
            3 => Self::Ldr,
            4 => Self::Lds,
            5 => Self::Sto,
            6 => Self::Stos,
            7 => Self::Add,
            8 => Self::And,
            9 => Self::Shr,
            10 => Self::Shl,
            11 => Self::B,
            12 => Self::Bz,
            13 => Self::Bnz,
            14 => Self::J,
            15 => Self::Jz,
            16 => Self::Jnz,
            17 => Self::Unlock,
            code => return Err(Error::InvalidOp(code)),
        })
    }
}

/// Source operand.
#[derive(Copy, Clone, Debug)]
pub enum Src<'a> {
    None,
    /// Constant bytes. Transmit data or little endian operand.
    Bytes(&'a [u8]),
    /// Offset into the sequencer memory.
    Mem(u16),
    /// Immediate operand.
    Imm(u32),
    /// Raw register id.
    Reg(u8),
    /// Branch target.
    Target(&'a [Transaction<'a>]),
}

/// Destination operand.
#[derive(Copy, Clone, Debug)]
pub enum Dst {
    None,
    /// Offset into the sequencer memory.
    Mem(u16),
}

/// One step of a transaction program.
///
/// The kind decides which of the fields are used.
/// Unused fields are ignored.
#[derive(Copy, Clone, Debug)]
pub struct Transaction<'a> {
    /// Raw [Op] code.
    pub op: u8,
    pub src: Src<'a>,
    pub dst: Dst,
    pub len: i32,
    pub reg: Option<Reg>,
}

impl<'a> Transaction<'a> {
    pub const fn new(op: Op, src: Src<'a>, dst: Dst, len: i32, reg: Option<Reg>) -> Self {
        Self::raw(op as u8, src, dst, len, reg)
    }

    /// Construct from a raw kind code.
    /// The code is only checked when the instruction is executed.
    pub const fn raw(op: u8, src: Src<'a>, dst: Dst, len: i32, reg: Option<Reg>) -> Self {
        Self {
            op,
            src,
            dst,
            len,
            reg,
        }
    }

    const fn reg_op(op: Op, reg: Reg, src: Src<'a>, len: i32) -> Self {
        Self::new(op, src, Dst::None, len, Some(reg))
    }

    pub const fn transfer(tx: Src<'a>, rx: Dst, len: u16) -> Self {
        Self::new(Op::Transfer, tx, rx, len as i32, None)
    }

    /// Transfer with both buffer offsets moved by the value of `reg`.
    pub const fn transfer_at(tx: Src<'a>, rx: Dst, len: u16, reg: Reg) -> Self {
        Self::new(Op::Transfer, tx, rx, len as i32, Some(reg))
    }

    pub const fn transfer_sel(tx: Src<'a>, rx: Dst, len: u16) -> Self {
        Self::new(Op::TransferSel, tx, rx, len as i32, None)
    }

    /// Toggle the select line only.
    pub const fn select() -> Self {
        Self::new(Op::TransferSel, Src::None, Dst::None, 0, None)
    }

    pub const fn ld_imm(reg: Reg, value: u32) -> Self {
        Self::reg_op(Op::Ld, reg, Src::Imm(value), 0)
    }

    pub const fn ld_mem(reg: Reg, offset: u16) -> Self {
        Self::reg_op(Op::Ld, reg, Src::Mem(offset), 0)
    }

    /// Clock in a 32 bit word into `reg`.
    pub const fn ld_spi(reg: Reg) -> Self {
        Self::reg_op(Op::Ld, reg, Src::None, 0)
    }

    /// Clock in a 32 bit word into memory.
    pub const fn ld_spi_mem(offset: u16) -> Self {
        Self::new(Op::Ld, Src::None, Dst::Mem(offset), 0, None)
    }

    pub const fn ldr(reg: Reg, from: Reg) -> Self {
        Self::reg_op(Op::Ldr, reg, Src::Reg(from as u8), 0)
    }

    pub const fn lds_imm(reg: Reg, value: u32) -> Self {
        Self::reg_op(Op::Lds, reg, Src::Imm(value), 0)
    }

    pub const fn lds_mem(reg: Reg, offset: u16) -> Self {
        Self::reg_op(Op::Lds, reg, Src::Mem(offset), 0)
    }

    /// Clock in a 16 bit half word into `reg`.
    pub const fn lds_spi(reg: Reg) -> Self {
        Self::reg_op(Op::Lds, reg, Src::None, 0)
    }

    pub const fn sto_mem(reg: Reg, offset: u16) -> Self {
        Self::reg_op(Op::Sto, reg, Src::Mem(offset), 0)
    }

    /// Clock out the 32 bit word in `reg`.
    pub const fn sto_spi(reg: Reg) -> Self {
        Self::reg_op(Op::Sto, reg, Src::None, 0)
    }

    pub const fn stos_mem(reg: Reg, offset: u16) -> Self {
        Self::reg_op(Op::Stos, reg, Src::Mem(offset), 0)
    }

    /// Clock out the low 16 bits of `reg`.
    pub const fn stos_spi(reg: Reg) -> Self {
        Self::reg_op(Op::Stos, reg, Src::None, 0)
    }

    pub const fn add(reg: Reg, delta: i32) -> Self {
        Self::reg_op(Op::Add, reg, Src::None, delta)
    }

    pub const fn and(reg: Reg, mask: u32) -> Self {
        Self::reg_op(Op::And, reg, Src::Imm(mask), 0)
    }

    pub const fn shr(reg: Reg, count: i32) -> Self {
        Self::reg_op(Op::Shr, reg, Src::None, count)
    }

    pub const fn shl(reg: Reg, count: i32) -> Self {
        Self::reg_op(Op::Shl, reg, Src::None, count)
    }

    /// Branch to the whole `target` program.
    pub const fn b(target: &'a [Transaction<'a>]) -> Self {
        Self::new(Op::B, Src::Target(target), Dst::None, target.len() as i32, None)
    }

    pub const fn bz(reg: Reg, target: &'a [Transaction<'a>]) -> Self {
        Self::reg_op(Op::Bz, reg, Src::Target(target), target.len() as i32)
    }

    pub const fn bnz(reg: Reg, target: &'a [Transaction<'a>]) -> Self {
        Self::reg_op(Op::Bnz, reg, Src::Target(target), target.len() as i32)
    }

    pub const fn j(distance: i32) -> Self {
        Self::new(Op::J, Src::None, Dst::None, distance, None)
    }

    pub const fn exit_ok() -> Self {
        Self::j(JP_EXIT_OK)
    }

    pub const fn exit_err() -> Self {
        Self::j(JP_EXIT_ERR)
    }

    pub const fn jz(reg: Reg, distance: i32) -> Self {
        Self::reg_op(Op::Jz, reg, Src::None, distance)
    }

    pub const fn jz_mask(reg: Reg, mask: u32, distance: i32) -> Self {
        Self::reg_op(Op::Jz, reg, Src::Imm(mask), distance)
    }

    pub const fn jnz(reg: Reg, distance: i32) -> Self {
        Self::reg_op(Op::Jnz, reg, Src::None, distance)
    }

    pub const fn jnz_mask(reg: Reg, mask: u32, distance: i32) -> Self {
        Self::reg_op(Op::Jnz, reg, Src::Imm(mask), distance)
    }

    pub const fn unlock(reg: Reg) -> Self {
        Self::reg_op(Op::Unlock, reg, Src::None, 0)
    }
}


// vim: ts=4 sw=4 expandtab
