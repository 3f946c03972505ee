// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SPI master channel of the transaction sequencer.

use crate::{
    hw::mcu,
    ports::{PB_SPI_SEL, PORTB},
};
use avr_atomic::AvrAtomic;
use avr_context::{InitCtx, InitCtxCell};
use txseq::Channel;

#[allow(non_snake_case)]
pub struct Dp {
    pub SPI: mcu::SPI,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: InitCtxCell<Dp> = unsafe { InitCtxCell::uninit() };

/// Write collisions since power on.
static COLLISIONS: AvrAtomic<u8> = AvrAtomic::new();

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _c: &InitCtx<'_>) {
        // Master, mode 0, MSB first, FCPU/16 = 1 MHz.
        self.SPI.spcr().write(|w| {
            w.spie().set_bit()
             .spe().set_bit()
             .dord().clear_bit()
             .mstr().set_bit()
             .cpol().clear_bit()
             .cpha().clear_bit()
             .spr().fosc_16_32()
        });
        self.SPI.spsr().write(|w| w.spi2x().clear_bit());
    }
}

/// Count a write collision, if one happened.
///
/// Reading SPSR with WCOL set followed by an SPDR access clears the flag.
fn check_collision() {
    if DP.SPI.spsr().read().wcol().bit_is_set() {
        COLLISIONS.store(COLLISIONS.load().wrapping_add(1));
    }
}

/// Read the byte that was received with the last shift.
pub fn spi_rx() -> u8 {
    check_collision();
    DP.SPI.spdr().read().bits()
}

pub struct SpiChannel;

impl Channel for SpiChannel {
    fn start(&mut self, byte: u8) {
        // Clear a stale completion flag: read SPSR, then SPDR.
        check_collision();
        let _ = DP.SPI.spdr().read().bits();
        DP.SPI.spdr().write(|w| w.set(byte));
    }

    fn next(&mut self, byte: u8) {
        DP.SPI.spdr().write(|w| w.set(byte));
        check_collision();
    }

    fn toggle_select(&mut self) {
        PORTB.toggle(PB_SPI_SEL);
    }

    fn error_count(&self) -> u16 {
        COLLISIONS.load().into()
    }
}

// vim: ts=4 sw=4 expandtab
