// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Register slot of the sequencer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Reg {
    A = 0,
    B = 1,
}

impl Reg {
    /// Number of registers.
    pub const COUNT: usize = 2;

    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// The register file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Registers([u32; Reg::COUNT]);

impl Registers {
    pub const fn new() -> Self {
        Self([0; Reg::COUNT])
    }

    #[inline]
    pub fn get(&self, reg: Reg) -> u32 {
        self.0[reg as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: Reg, value: u32) {
        self.0[reg as usize] = value;
    }

    /// Get a register by its raw id.
    pub fn get_id(&self, id: u8) -> Option<u32> {
        Reg::from_id(id).map(|reg| self.get(reg))
    }
}


// vim: ts=4 sw=4 expandtab
