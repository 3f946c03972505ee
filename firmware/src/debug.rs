// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debug value stream.
//!
//! The values are sent round robin as `[id, lo, hi]` frames.
//! Each round ends with the `[0xFF, 0xFF, 0xFF]` sync frame.

use crate::hw::interrupt;
use avr_context::{InitCtx, IrqCtx, Mutex};
use core::cell::Cell;

#[cfg(feature = "debug")]
use crate::usart::uart_tx_cs;

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Debug {
    Moisture,
    Valve,
    SysState,
    LinkState,
    LinkErrors,
    LinkLastError,
    MinStack,
    Uptime,
}
const NRVALUES: usize = 8;

const SYNC: u8 = 0xFF;
const INDEXSHIFT: usize = 2;
const INDEXMASK: u8 = (1 << INDEXSHIFT) - 1;

static VALUES: Mutex<[Cell<u16>; NRVALUES]> = Mutex::new([const { Cell::new(0) }; NRVALUES]);
static INDEX: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

#[cfg_attr(not(feature = "debug"), allow(dead_code))]
pub fn tx_complete_callback(c: &IrqCtx<'_>) {
    #[cfg(feature = "debug")]
    {
        let cs = c.cs();
        let index = INDEX.borrow(cs).get();
        let id = index >> INDEXSHIFT;
        let txindex = index & INDEXMASK;

        let value = if id < NRVALUES as u8 {
            VALUES.borrow(cs)[id as usize].get()
        } else {
            0xFFFF
        };

        let (data, next) = match txindex {
            0 => (if id < NRVALUES as u8 { id } else { SYNC }, index + 1),
            1 => (value as u8, index + 1),
            _ => {
                let next = if id >= NRVALUES as u8 {
                    0
                } else {
                    (id + 1) << INDEXSHIFT
                };
                ((value >> 8) as u8, next)
            }
        };
        if uart_tx_cs(cs, data) {
            INDEX.borrow(cs).set(next);
        }
    }
    #[cfg(not(feature = "debug"))]
    let _ = c;
}

impl Debug {
    pub fn log_u16(&self, value: u16) {
        interrupt::free(|cs| {
            let id = *self as usize;
            let values = VALUES.borrow(cs);
            if id < values.len() {
                values[id].set(value);
            }
        });
    }

    pub fn log_u8(&self, value: u8) {
        self.log_u16(value.into())
    }
}

pub fn debug_init(c: &InitCtx<'_>) {
    // Kick off the stream. The transmit complete interrupt keeps it going.
    #[cfg(feature = "debug")]
    uart_tx_cs(c.cs(), SYNC);
    #[cfg(not(feature = "debug"))]
    let _ = c;
}

// vim: ts=4 sw=4 expandtab
