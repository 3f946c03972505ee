// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    Error,
    isa::{Dst, JP_EXIT_ERR, JP_EXIT_OK, Op, Src, Transaction},
    regs::{Reg, Registers},
    xfer::{Channel, Engine, Rx, Tx},
};

pub(crate) type Program<'a> = &'a [Transaction<'a>];

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Step {
    /// Decode the next instruction.
    Continue,
    /// A transfer is running. Decoding resumes after its completion.
    Pending,
    /// The program has ended.
    Finished,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Width {
    Word,
    Half,
}

impl Width {
    const fn bytes(self) -> i32 {
        match self {
            Self::Word => 4,
            Self::Half => 2,
        }
    }

    const fn mask(self, value: u32) -> u32 {
        match self {
            Self::Word => value,
            Self::Half => value & 0xFFFF,
        }
    }
}

/// The one and only return point.
#[derive(Copy, Clone, Debug)]
struct Return<'a> {
    prog: Program<'a>,
    /// Position of the branch instruction.
    pos: usize,
    remaining: i32,
}

/// Interpreter context: program counter, return slot and registers.
pub(crate) struct Interp<'a> {
    prog: Option<Program<'a>>,
    pos: usize,
    remaining: i32,
    ret: Option<Return<'a>>,
    regs: Registers,
    /// Register waiting for the data of the running transfer.
    load: Option<(Reg, Width)>,
}

fn reg_of(t: &Transaction<'_>) -> Result<Reg, Error> {
    t.reg.ok_or(Error::NoRegister)
}

impl<'a> Interp<'a> {
    pub const fn new() -> Self {
        Self {
            prog: None,
            pos: 0,
            remaining: 0,
            ret: None,
            regs: Registers::new(),
            load: None,
        }
    }

    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[cfg(test)]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[cfg(test)]
    pub fn remaining(&self) -> i32 {
        self.remaining
    }

    /// Saved (position, remaining) of the pending return, if any.
    #[cfg(test)]
    pub fn return_point(&self) -> Option<(usize, i32)> {
        self.ret.map(|ret| (ret.pos, ret.remaining))
    }

    pub fn start(&mut self, prog: Program<'a>, count: i16) {
        self.prog = Some(prog);
        self.pos = 0;
        self.remaining = count.into();
        // A return point left behind by an aborted program is not ours.
        self.ret = None;
        self.load = None;
    }

    /// Apply the data of a completed transfer.
    pub fn complete<C: Channel, const MEM: usize>(&mut self, eng: &Engine<'a, C, MEM>) {
        if let Some((reg, width)) = self.load.take() {
            self.regs.set(reg, width.mask(eng.latch()));
        }
    }

    /// Decode and execute until the program ends or a transfer is pending.
    pub fn run<C: Channel, const MEM: usize>(
        &mut self,
        eng: &mut Engine<'a, C, MEM>,
    ) -> Result<Step, Error> {
        loop {
            let Some(prog) = self.prog else {
                return Err(Error::NullProgram);
            };

            if self.remaining <= 0 {
                match self.ret.take() {
                    Some(ret) => {
                        self.prog = Some(ret.prog);
                        self.pos = ret.pos + 1;
                        self.remaining = ret.remaining;
                        continue;
                    }
                    None => return Ok(Step::Finished),
                }
            }

            let at = self.pos;
            let t = *prog.get(at).ok_or(Error::Overrun)?;
            let op = Op::try_from(t.op)?;
            self.remaining -= 1;
            self.pos = at + 1;

            match self.exec(eng, op, &t, at)? {
                Step::Continue => (),
                step => return Ok(step),
            }
        }
    }

    fn exec<C: Channel, const MEM: usize>(
        &mut self,
        eng: &mut Engine<'a, C, MEM>,
        op: Op,
        t: &Transaction<'a>,
        at: usize,
    ) -> Result<Step, Error> {
        match op {
            Op::Transfer => self.transfer(eng, t, false),
            Op::TransferSel => self.transfer(eng, t, true),
            Op::Ld => self.load(eng, t, Width::Word),
            Op::Lds => self.load(eng, t, Width::Half),
            Op::Ldr => {
                let reg = reg_of(t)?;
                let Src::Reg(id) = t.src else {
                    return Err(Error::NoRegister);
                };
                let value = self.regs.get_id(id).ok_or(Error::InvalidRegister(id))?;
                self.regs.set(reg, value);
                Ok(Step::Continue)
            }
            Op::Sto => self.store(eng, t, Width::Word),
            Op::Stos => self.store(eng, t, Width::Half),
            Op::Add => {
                let reg = reg_of(t)?;
                self.regs
                    .set(reg, self.regs.get(reg).wrapping_add_signed(t.len));
                Ok(Step::Continue)
            }
            Op::And => {
                let reg = reg_of(t)?;
                let mask = operand(eng, t.src)?.unwrap_or(u32::MAX);
                self.regs.set(reg, self.regs.get(reg) & mask);
                Ok(Step::Continue)
            }
            Op::Shr => {
                let reg = reg_of(t)?;
                let value = self.regs.get(reg).checked_shr(t.len as u32).unwrap_or(0);
                self.regs.set(reg, value);
                Ok(Step::Continue)
            }
            Op::Shl => {
                let reg = reg_of(t)?;
                let value = self.regs.get(reg).checked_shl(t.len as u32).unwrap_or(0);
                self.regs.set(reg, value);
                Ok(Step::Continue)
            }
            Op::B => self.branch(t, at),
            Op::Bz | Op::Bnz => {
                let zero = self.regs.get(reg_of(t)?) == 0;
                if zero == (op == Op::Bz) {
                    self.branch(t, at)
                } else {
                    Ok(Step::Continue)
                }
            }
            Op::J => self.jump(t, at),
            Op::Jz | Op::Jnz => {
                let reg = reg_of(t)?;
                let mask = operand(eng, t.src)?.unwrap_or(u32::MAX);
                let zero = self.regs.get(reg) & mask == 0;
                if zero == (op == Op::Jz) {
                    self.jump(t, at)
                } else {
                    Ok(Step::Continue)
                }
            }
            Op::Unlock => {
                let reg = reg_of(t)?;
                self.regs.set(reg, unlock(self.regs.get(reg)));
                Ok(Step::Continue)
            }
        }
    }

    fn transfer<C: Channel, const MEM: usize>(
        &mut self,
        eng: &mut Engine<'a, C, MEM>,
        t: &Transaction<'a>,
        select: bool,
    ) -> Result<Step, Error> {
        if t.len == 0 {
            if select {
                eng.chan_mut().toggle_select();
            }
            return Ok(Step::Continue);
        }

        let offset = match t.reg {
            Some(reg) => usize::try_from(self.regs.get(reg)).map_err(|_| Error::Bounds)?,
            None => 0,
        };
        let shift = |base: u16| (base as usize).checked_add(offset).ok_or(Error::Bounds);

        let tx = match t.src {
            Src::Bytes(bytes) => Tx::Bytes(bytes.get(offset..).ok_or(Error::Bounds)?),
            Src::Mem(base) => Tx::Mem(shift(base)?),
            _ => Tx::Zero,
        };
        let rx = match t.dst {
            Dst::Mem(base) => Rx::Mem(shift(base)?),
            Dst::None => Rx::Discard,
        };

        if select {
            // The select line stays untouched, if the transfer can't start.
            eng.check(tx, rx, t.len)?;
            eng.chan_mut().toggle_select();
        }
        started(eng.start(tx, rx, t.len)?)
    }

    fn load<C: Channel, const MEM: usize>(
        &mut self,
        eng: &mut Engine<'a, C, MEM>,
        t: &Transaction<'a>,
        width: Width,
    ) -> Result<Step, Error> {
        if let Some(value) = operand(eng, t.src)? {
            self.regs.set(reg_of(t)?, width.mask(value));
            return Ok(Step::Continue);
        }

        match t.dst {
            Dst::Mem(offset) => started(eng.start(Tx::Zero, Rx::Mem(offset.into()), width.bytes())?),
            Dst::None => {
                let reg = reg_of(t)?;
                let step = started(eng.start(Tx::Zero, Rx::Latch, width.bytes())?)?;
                self.load = Some((reg, width));
                Ok(step)
            }
        }
    }

    fn store<C: Channel, const MEM: usize>(
        &mut self,
        eng: &mut Engine<'a, C, MEM>,
        t: &Transaction<'a>,
        width: Width,
    ) -> Result<Step, Error> {
        let value = width.mask(self.regs.get(reg_of(t)?));

        if let Src::Mem(offset) = t.src {
            eng.write_word(offset, value)?;
            Ok(Step::Continue)
        } else {
            eng.set_latch(value);
            started(eng.start(Tx::Latch, Rx::Discard, width.bytes())?)
        }
    }

    fn branch(&mut self, t: &Transaction<'a>, at: usize) -> Result<Step, Error> {
        let Some(prog) = self.prog else {
            return Err(Error::NullProgram);
        };

        // Only one return point exists. Nested branches overwrite it.
        self.ret = Some(Return {
            prog,
            pos: at,
            remaining: self.remaining,
        });

        self.prog = match t.src {
            Src::Target(target) => Some(target),
            _ => None,
        };
        self.pos = 0;
        self.remaining = t.len;
        Ok(Step::Continue)
    }

    fn jump(&mut self, t: &Transaction<'a>, at: usize) -> Result<Step, Error> {
        match t.len {
            JP_EXIT_OK => Ok(Step::Finished),
            JP_EXIT_ERR => Err(Error::ExitFailure),
            distance => {
                // The jump itself has already been counted.
                let pos = i64::try_from(at).map_err(|_| Error::Overrun)? + i64::from(distance);
                let remaining = i64::from(self.remaining) - (i64::from(distance) - 1);

                self.pos = usize::try_from(pos).map_err(|_| Error::Overrun)?;
                self.remaining = match i32::try_from(remaining) {
                    Ok(remaining) if remaining >= 0 => remaining,
                    _ => return Err(Error::Overrun),
                };
                Ok(Step::Continue)
            }
        }
    }
}

fn started(pending: bool) -> Result<Step, Error> {
    Ok(if pending {
        Step::Pending
    } else {
        Step::Continue
    })
}

/// Fetch a 32 bit source operand.
fn operand<C: Channel, const MEM: usize>(
    eng: &Engine<'_, C, MEM>,
    src: Src<'_>,
) -> Result<Option<u32>, Error> {
    Ok(match src {
        Src::Imm(value) => Some(value),
        Src::Mem(offset) => Some(eng.read_word(offset)?),
        Src::Bytes(bytes) => {
            let word = bytes.get(..4).ok_or(Error::Bounds)?;
            Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        }
        Src::None | Src::Reg(_) | Src::Target(_) => None,
    })
}

/// Peripheral unlock response:
/// incremented low byte moves up, high byte moves down.
pub(crate) const fn unlock(value: u32) -> u32 {
    ((value.wrapping_add(1) & 0xFF) << 8) | ((value >> 8) & 0xFF)
}


// vim: ts=4 sw=4 expandtab
