// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![no_std]

//! # txseq: Serial transaction sequencer
//!
//! A small virtual machine that runs programs of [Transaction]s against a
//! byte oriented serial [Channel] (usually SPI).
//!
//! A program is an immutable array of transactions, normally placed in flash.
//! The machine has two 32 bit registers, one level of subroutine call and
//! relative jumps with explicit exit codes.
//! Register operations run synchronously.
//! Transfers are started on the channel and the machine resumes decoding
//! from the channel interrupt, after the last byte has been clocked.
//!
//! ## Example
//!
//! ```
//! use txseq::{Channel, Dst, Reg, Sequencer, Src, Status, Transaction};
//!
//! struct Loopback(Option<u8>);
//!
//! impl Channel for Loopback {
//!     fn start(&mut self, byte: u8) { self.0 = Some(byte); }
//!     fn next(&mut self, byte: u8) { self.0 = Some(byte); }
//!     fn toggle_select(&mut self) {}
//!     fn error_count(&self) -> u16 { 0 }
//! }
//!
//! static PROGRAM: [Transaction<'static>; 3] = [
//!     Transaction::ld_imm(Reg::A, 0x1234),
//!     Transaction::unlock(Reg::A),
//!     Transaction::sto_spi(Reg::A),
//! ];
//!
//! let mut seq: Sequencer<'_, Loopback, 8> = Sequencer::new(Loopback(None));
//! assert_eq!(seq.submit(&PROGRAM, 3), Ok(Status::Pending));
//!
//! // The channel interrupt handler feeds the received bytes back in.
//! let mut outcome = None;
//! while outcome.is_none() {
//!     let rx = seq.channel_mut().0.take().unwrap();
//!     outcome = seq.transfer_irq(rx);
//! }
//! assert_eq!(outcome, Some(Ok(Status::Finished)));
//! assert_eq!(seq.registers().get(Reg::A), 0x3512);
//! ```

mod interp;
mod isa;
mod regs;
mod seq;
mod xfer;

pub use crate::{
    isa::{Dst, JP_EXIT_ERR, JP_EXIT_OK, Op, Src, Transaction},
    regs::{Reg, Registers},
    seq::{Sequencer, State, Status},
    xfer::Channel,
};

use derive_more::Display;

/// Transaction program failures.
///
/// Everything except [Error::Busy] terminates the running program
/// and returns the sequencer to idle.
/// Nothing is rolled back.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum Error {
    /// A program is already running. The submission was rejected.
    #[display("sequencer busy")]
    Busy,
    /// The decoded instruction kind is unknown.
    #[display("invalid instruction kind {_0}")]
    InvalidOp(u8),
    /// A branch led to a missing program.
    #[display("no program")]
    NullProgram,
    /// The program counter left the program array.
    #[display("program counter out of range")]
    Overrun,
    /// Register-to-register load from an unknown register.
    #[display("invalid register {_0}")]
    InvalidRegister(u8),
    /// The instruction needs a register operand, but has none.
    #[display("missing register operand")]
    NoRegister,
    /// Buffer or memory access outside of its bounds.
    #[display("buffer access out of bounds")]
    Bounds,
    /// The program jumped to [JP_EXIT_ERR].
    #[display("program exit with failure")]
    ExitFailure,
    /// The channel counted a transfer error.
    #[display("transfer error")]
    Transfer,
}

impl core::error::Error for Error {}

impl Error {
    /// Compact code for logging.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Busy => 1,
            Self::InvalidOp(_) => 2,
            Self::NullProgram => 3,
            Self::Overrun => 4,
            Self::InvalidRegister(_) => 5,
            Self::NoRegister => 6,
            Self::Bounds => 7,
            Self::ExitFailure => 8,
            Self::Transfer => 9,
        }
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::InvalidOp(42).to_string(), "invalid instruction kind 42");
        assert_eq!(Error::InvalidRegister(7).to_string(), "invalid register 7");
        assert_eq!(Error::ExitFailure.to_string(), "program exit with failure");
    }

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Busy.code(), 1);
        assert_eq!(Error::InvalidOp(0xFF).code(), Error::InvalidOp(0).code());
        assert_eq!(Error::Transfer.code(), 9);
    }
}

// vim: ts=4 sw=4 expandtab
