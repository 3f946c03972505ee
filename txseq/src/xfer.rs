// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::Error;

/// Hardware side of the transfer engine.
///
/// The channel shifts one byte at a time.
/// After each shifted byte the channel interrupt must call
/// [Sequencer::transfer_irq](crate::Sequencer::transfer_irq)
/// with the byte that was received.
pub trait Channel {
    /// Arm the channel and clock out the first byte of a new transfer.
    ///
    /// Completion and error flags left over from an earlier transfer
    /// must be cleared before arming.
    /// A stale completion flag would otherwise finish the new transfer early.
    fn start(&mut self, byte: u8);

    /// Clock out the next byte of the running transfer.
    fn next(&mut self, byte: u8);

    /// Toggle the peripheral select line to mark the start of a new operation.
    fn toggle_select(&mut self);

    /// Number of transfer errors since power on. Wraps around.
    fn error_count(&self) -> u16;
}

/// Transmit data of a transfer.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Tx<'a> {
    /// Clock out zeros.
    Zero,
    Bytes(&'a [u8]),
    Mem(usize),
    /// The register latch.
    Latch,
}

/// Receive target of a transfer.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Rx {
    Discard,
    Mem(usize),
    Latch,
}

#[derive(Copy, Clone, Debug)]
struct Transfer<'a> {
    tx: Tx<'a>,
    rx: Rx,
    len: u16,
    pos: u16,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Pump {
    /// No transfer is armed. The event was ignored.
    Spurious,
    /// The next byte has been clocked out.
    Running,
    /// All bytes have been transferred.
    Done,
}

const LATCH_SIZE: usize = 4;

pub(crate) struct Engine<'a, C, const MEM: usize> {
    chan: C,
    mem: [u8; MEM],
    latch: [u8; LATCH_SIZE],
    xfer: Option<Transfer<'a>>,
}

impl<'a, C: Channel, const MEM: usize> Engine<'a, C, MEM> {
    pub const fn new(chan: C) -> Self {
        Self {
            chan,
            mem: [0; MEM],
            latch: [0; LATCH_SIZE],
            xfer: None,
        }
    }

    pub fn chan(&self) -> &C {
        &self.chan
    }

    pub fn chan_mut(&mut self) -> &mut C {
        &mut self.chan
    }

    pub fn mem(&self) -> &[u8] {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.xfer.is_some()
    }

    fn check_mem(offset: usize, len: usize) -> Result<(), Error> {
        match offset.checked_add(len) {
            Some(end) if end <= MEM => Ok(()),
            _ => Err(Error::Bounds),
        }
    }

    /// Read a little endian word from memory.
    pub fn read_word(&self, offset: u16) -> Result<u32, Error> {
        let offset = offset as usize;
        Self::check_mem(offset, 4)?;
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&self.mem[offset..offset + 4]);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Write a little endian word to memory.
    pub fn write_word(&mut self, offset: u16, value: u32) -> Result<(), Error> {
        let offset = offset as usize;
        Self::check_mem(offset, 4)?;
        self.mem[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn set_latch(&mut self, value: u32) {
        self.latch = value.to_le_bytes();
    }

    pub fn latch(&self) -> u32 {
        u32::from_le_bytes(self.latch)
    }

    /// Check that a transfer of `len` bytes fits its buffers.
    pub fn check(&self, tx: Tx<'a>, rx: Rx, len: i32) -> Result<u16, Error> {
        if len == 0 {
            return Ok(0);
        }
        let len: u16 = len.try_into().map_err(|_| Error::Bounds)?;
        let n = len as usize;

        match tx {
            Tx::Zero => (),
            Tx::Bytes(bytes) if n <= bytes.len() => (),
            Tx::Bytes(_) => return Err(Error::Bounds),
            Tx::Mem(offset) => Self::check_mem(offset, n)?,
            Tx::Latch if n <= LATCH_SIZE => (),
            Tx::Latch => return Err(Error::Bounds),
        }
        match rx {
            Rx::Discard => (),
            Rx::Mem(offset) => Self::check_mem(offset, n)?,
            Rx::Latch if n <= LATCH_SIZE => (),
            Rx::Latch => return Err(Error::Bounds),
        }
        Ok(len)
    }

    /// Start a transfer of `len` bytes.
    ///
    /// Returns `false`, if there was nothing to transfer.
    pub fn start(&mut self, tx: Tx<'a>, rx: Rx, len: i32) -> Result<bool, Error> {
        let len = self.check(tx, rx, len)?;
        if len == 0 {
            return Ok(false);
        }

        let xfer = Transfer {
            tx,
            rx,
            len,
            pos: 0,
        };
        let byte = self.tx_byte(&xfer);
        self.xfer = Some(xfer);
        self.chan.start(byte);
        Ok(true)
    }

    fn tx_byte(&self, xfer: &Transfer<'a>) -> u8 {
        let pos = xfer.pos as usize;
        let byte = match xfer.tx {
            Tx::Zero => None,
            Tx::Bytes(bytes) => bytes.get(pos),
            Tx::Mem(offset) => self.mem.get(offset + pos),
            Tx::Latch => self.latch.get(pos),
        };
        byte.copied().unwrap_or(0)
    }

    /// Handle one shifted byte.
    pub fn pump(&mut self, rx: u8) -> Pump {
        let Some(mut xfer) = self.xfer.take() else {
            return Pump::Spurious;
        };

        let pos = xfer.pos as usize;
        let slot = match xfer.rx {
            Rx::Discard => None,
            Rx::Mem(offset) => self.mem.get_mut(offset + pos),
            Rx::Latch => self.latch.get_mut(pos),
        };
        if let Some(slot) = slot {
            *slot = rx;
        }

        xfer.pos += 1;
        if xfer.pos < xfer.len {
            let byte = self.tx_byte(&xfer);
            self.xfer = Some(xfer);
            self.chan.next(byte);
            Pump::Running
        } else {
            Pump::Done
        }
    }
}



// vim: ts=4 sw=4 expandtab
