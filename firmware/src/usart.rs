// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    debug,
    hw::{FCPU, mcu},
};
use avr_context::{CriticalSection, InitCtx, InitCtxCell, IrqCtx, Mutex};
use core::cell::Cell;

const BAUD: u32 = 19_200;
const UBRR: u16 = (FCPU / (16 * BAUD) - 1) as u16;

#[allow(non_snake_case)]
pub struct Dp {
    pub USART0: mcu::USART0,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: InitCtxCell<Dp> = unsafe { InitCtxCell::uninit() };

static TX_BUSY: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _c: &InitCtx<'_>) {
        self.USART0.ubrr0().write(|w| w.set(UBRR));
        self.USART0.ucsr0a().write(|w| w.txc0().set_bit());
        self.USART0.ucsr0c().write(|w| {
            w.umsel0().usart_async()
             .upm0().disabled()
             .usbs0().stop1()
             .ucsz0().chr8()
        });
        self.USART0.ucsr0b().write(|w| {
            w.txen0().set_bit()
             .txcie0().set_bit()
        });
    }
}

/// USART transmit complete interrupt.
pub fn irq_handler_usart_tx(c: &IrqCtx<'_>) {
    TX_BUSY.borrow(c.cs()).set(false);
    debug::tx_complete_callback(c);
}

/// Start transmission of one byte.
///
/// Returns `false`, if the transmitter is busy.
pub fn uart_tx_cs(cs: CriticalSection<'_>, data: u8) -> bool {
    let busy = TX_BUSY.borrow(cs);
    if busy.get() {
        false
    } else {
        busy.set(true);
        DP.USART0.udr0().write(|w| w.set(data));
        true
    }
}

// vim: ts=4 sw=4 expandtab
