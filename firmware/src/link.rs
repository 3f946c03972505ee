// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External peripheral on the SPI bus.
//!
//! After power on the peripheral must be unlocked with a challenge-response
//! handshake. Then the moisture history is reported periodically.

use crate::{
    debug::Debug,
    history::History,
    hw::{interrupt, unwrap_option},
    spi::{SpiChannel, spi_rx},
    system::MOISTURE_HIST,
    timer::{RelSeconds, Seconds},
};
use avr_context::{IrqCtx, MainCtx, MainCtxCell, Mutex};
use core::cell::RefCell;
use txseq::{Dst, Error, Reg, Sequencer, Src, Status, Transaction};

/// Transfer memory layout.
const MEM_HIST: u16 = 0;
const MEM_SIZE: usize = MOISTURE_HIST * 2;

const CMD_CHALLENGE: [u8; 1] = [0x10];
const CMD_UNLOCK: [u8; 1] = [0x11];
const CMD_STATUS: [u8; 1] = [0x12];
const CMD_REPORT: [u8; 1] = [0x20];

/// Status word bit: peripheral accepted the unlock response.
const STATUS_UNLOCKED: u32 = 0x0001;

/// Time between two reports.
const REPORT_INTERVAL: RelSeconds = RelSeconds::from_secs(60);
/// Retry delay after a failed program.
const BACKOFF: RelSeconds = RelSeconds::from_secs(5);
/// A program running longer than this is considered stalled.
const STALL_TIME: RelSeconds = RelSeconds::from_secs(2);

static UNLOCK: [Transaction<'static>; 13] = [
    // Read the 16 bit challenge.
    Transaction::transfer_sel(Src::Bytes(&CMD_CHALLENGE), Dst::None, 1),
    Transaction::lds_spi(Reg::A),
    Transaction::select(),
    // Answer.
    Transaction::unlock(Reg::A),
    Transaction::transfer_sel(Src::Bytes(&CMD_UNLOCK), Dst::None, 1),
    Transaction::stos_spi(Reg::A),
    Transaction::select(),
    // Check the result.
    Transaction::transfer_sel(Src::Bytes(&CMD_STATUS), Dst::None, 1),
    Transaction::lds_spi(Reg::B),
    Transaction::select(),
    Transaction::jz_mask(Reg::B, STATUS_UNLOCKED, 2),
    Transaction::exit_ok(),
    Transaction::exit_err(),
];

static REPORT_HEADER: [Transaction<'static>; 3] = [
    Transaction::transfer_sel(Src::Bytes(&CMD_REPORT), Dst::None, 1),
    Transaction::ld_imm(Reg::A, MOISTURE_HIST as u32),
    Transaction::stos_spi(Reg::A),
];

static REPORT: [Transaction<'static>; 9] = [
    Transaction::b(&REPORT_HEADER),
    // Stream the history words. A is the memory offset, B counts down.
    Transaction::ld_imm(Reg::A, 0),
    Transaction::ld_imm(Reg::B, MOISTURE_HIST as u32),
    Transaction::transfer_at(Src::Mem(MEM_HIST), Dst::None, 2, Reg::A),
    Transaction::add(Reg::A, 2),
    Transaction::add(Reg::B, -1),
    Transaction::jnz(Reg::B, -3),
    Transaction::select(),
    Transaction::exit_ok(),
];

type LinkSequencer = Sequencer<'static, SpiChannel, MEM_SIZE>;

static SEQ: Mutex<RefCell<LinkSequencer>> = Mutex::new(RefCell::new(Sequencer::new(SpiChannel)));

/// SPI serial transfer complete interrupt.
pub fn irq_handler_spi_stc(c: &IrqCtx<'_>) {
    let rx = spi_rx();
    let mut seq = unwrap_option(SEQ.borrow(c.cs()).try_borrow_mut().ok());
    // Terminal outcomes are picked up in main context with take_result().
    let _ = seq.transfer_irq(rx);
}

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
enum LinkState {
    /// Start the unlock handshake.
    Locked,
    /// Unlock program is running.
    Unlocking,
    /// Waiting for the next report.
    Idle,
    /// Report program is running.
    Reporting,
    /// Waiting before the next unlock attempt.
    Backoff,
}

pub struct Link {
    state: MainCtxCell<LinkState>,
    /// Start of the running program, or end of the wait time.
    stamp: MainCtxCell<Seconds>,
    stalled: MainCtxCell<bool>,
    errors: MainCtxCell<u16>,
}

impl Link {
    pub const fn new() -> Self {
        Self {
            state: MainCtxCell::new(LinkState::Locked),
            stamp: MainCtxCell::new(Seconds::new()),
            stalled: MainCtxCell::new(false),
            errors: MainCtxCell::new(0),
        }
    }

    fn set_state(&self, m: &MainCtx<'_>, state: LinkState, stamp: Seconds) {
        self.state.set(m, state);
        self.stamp.set(m, stamp);
        self.stalled.set(m, false);
        Debug::LinkState.log_u8(state as u8);
    }

    fn fail(&self, m: &MainCtx<'_>, now: Seconds, error: Error) {
        let errors = self.errors.get(m).wrapping_add(1);
        self.errors.set(m, errors);
        Debug::LinkErrors.log_u16(errors);
        Debug::LinkLastError.log_u8(error.code());
        self.set_state(m, LinkState::Backoff, now + BACKOFF);
    }

    /// Submit a program. Optionally load the transfer memory before.
    fn submit(
        &self,
        m: &MainCtx<'_>,
        program: &'static [Transaction<'static>],
        hist: Option<&History<MOISTURE_HIST>>,
    ) -> Result<Status, Error> {
        interrupt::free(|cs| {
            let mut seq = unwrap_option(SEQ.borrow(cs).try_borrow_mut().ok());
            if let (Some(hist), Some(mem)) = (hist, seq.memory_mut()) {
                hist.write_le(m, mem);
            }
            seq.submit(program, program.len() as i16)
        })
    }

    fn take_result(&self) -> Option<Result<(), Error>> {
        interrupt::free(|cs| {
            let mut seq = unwrap_option(SEQ.borrow(cs).try_borrow_mut().ok());
            seq.take_result()
        })
    }

    /// Start a program and move to `running` or handle its immediate outcome.
    fn start(
        &self,
        m: &MainCtx<'_>,
        now: Seconds,
        program: &'static [Transaction<'static>],
        hist: Option<&History<MOISTURE_HIST>>,
        running: LinkState,
    ) {
        match self.submit(m, program, hist) {
            Ok(Status::Pending) => self.set_state(m, running, now),
            Ok(Status::Finished) => self.done(m, now, running),
            // Still busy with a stalled program. Try again later.
            Err(Error::Busy) => (),
            Err(e) => self.fail(m, now, e),
        }
    }

    /// A program finished successfully.
    fn done(&self, m: &MainCtx<'_>, now: Seconds, running: LinkState) {
        match running {
            LinkState::Unlocking => self.set_state(m, LinkState::Idle, now),
            _ => self.set_state(m, LinkState::Idle, now + REPORT_INTERVAL),
        }
    }

    pub fn run(&self, m: &MainCtx<'_>, now: Seconds, hist: &History<MOISTURE_HIST>) {
        match self.state.get(m) {
            LinkState::Locked => {
                self.start(m, now, &UNLOCK, None, LinkState::Unlocking);
            }
            LinkState::Idle => {
                if now >= self.stamp.get(m) {
                    self.start(m, now, &REPORT, Some(hist), LinkState::Reporting);
                }
            }
            state @ (LinkState::Unlocking | LinkState::Reporting) => match self.take_result() {
                Some(Ok(())) => self.done(m, now, state),
                Some(Err(e)) => {
                    self.fail(m, now, e);
                }
                None => {
                    // There is no timeout in the sequencer. Report the stall once.
                    if !self.stalled.get(m) && now >= self.stamp.get(m) + STALL_TIME {
                        self.stalled.set(m, true);
                        Debug::LinkLastError.log_u8(0xFF);
                    }
                }
            },
            LinkState::Backoff => {
                if now >= self.stamp.get(m) {
                    self.set_state(m, LinkState::Locked, now);
                }
            }
        }
    }
}

// vim: ts=4 sw=4 expandtab
