// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::hw::mcu;
use avr_context::{InitCtx, InitCtxCell};

#[rustfmt::skip]
macro_rules! impl_port {
    (
        $struct:ident,
        $name:ident,
        $port:ident,
        $pin:ident
    ) => {
        #[allow(non_snake_case)]
        pub struct $struct {
            pub $name: mcu::$name,
        }

        // SAFETY: Is initialized when constructing the MainCtx.
        pub static $name: InitCtxCell<$struct> = unsafe { InitCtxCell::uninit() };

        impl $struct {
            #[inline(always)]
            #[allow(dead_code)]
            pub fn get(&self, bit: u8) -> bool {
                self.$name.$pin().read().bits() & (1 << bit) != 0
            }

            #[inline(always)]
            pub fn set(&self, bit: u8, value: bool) {
                // SAFETY: Only the addressed pin bit is changed.
                self.$name.$port().modify(|r, w| unsafe {
                    if value {
                        w.bits(r.bits() | (1 << bit))
                    } else {
                        w.bits(r.bits() & !(1 << bit))
                    }
                });
            }

            #[inline(always)]
            #[allow(dead_code)]
            pub fn toggle(&self, bit: u8) {
                // SAFETY: Writing a one to PINx toggles the output of the pin.
                self.$name.$pin().write(|w| unsafe { w.bits(1 << bit) });
            }

            /// Write the whole port with a mask of the affected bits.
            #[inline(always)]
            pub fn write_masked(&self, mask: u8, value: u8) {
                // SAFETY: Only the masked pin bits are changed.
                self.$name.$port().modify(|r, w| unsafe {
                    w.bits((r.bits() & !mask) | (value & mask))
                });
            }
        }
    };
}

impl_port!(PortB, PORTB, portb, pinb);
impl_port!(PortC, PORTC, portc, pinc);
impl_port!(PortD, PORTD, portd, pind);

/// Select line of the external peripheral.
pub const PB_SPI_SEL: u8 = 2;
/// Power supply of the moisture sensor.
pub const PC_SENSOR_EN: u8 = 2;
/// Status LED.
#[cfg_attr(not(feature = "testing"), allow(dead_code))]
pub const PB_LED: u8 = 0;
/// Stepper coils orange, yellow, pink, blue.
pub const PD_STEPPER_SHIFT: u8 = 4;
pub const PD_STEPPER_MASK: u8 = 0xF << PD_STEPPER_SHIFT;

fn pin_input(_bit: usize) -> u8 {
    0
}
fn pin_output(bit: usize) -> u8 {
    1 << bit
}
fn pin_low(_bit: usize) -> u8 {
    0
}
fn pin_high(bit: usize) -> u8 {
    1 << bit
}
fn pin_floating(_bit: usize) -> u8 {
    0
}
fn pin_pullup(bit: usize) -> u8 {
    1 << bit
}

impl PortB {
    pub fn setup(&self, _: &InitCtx<'_>) {
        // SAFETY: Called with interrupts disabled. Ensured by &InitCtx.
        unsafe {
            self.PORTB.portb().write(|w| {
                w.bits(
                    pin_low(0) | // LED
                    pin_low(1) | // Debug
                    pin_high(2) | // SPI select, idle high
                    pin_low(3) | // SPI MOSI
                    pin_pullup(4) | // SPI MISO
                    pin_low(5) | // SPI SCK
                    pin_floating(6) | // XTAL1
                    pin_floating(7), // XTAL2
                )
            });
            self.PORTB.ddrb().write(|w| {
                w.bits(
                    pin_output(0) | // LED
                    pin_output(1) | // Debug
                    pin_output(2) | // SPI select
                    pin_output(3) | // SPI MOSI
                    pin_input(4) | // SPI MISO
                    pin_output(5) | // SPI SCK
                    pin_input(6) | // XTAL1
                    pin_input(7), // XTAL2
                )
            });
        }
    }
}

impl PortC {
    pub fn setup(&self, _: &InitCtx<'_>) {
        // SAFETY: Called with interrupts disabled. Ensured by &InitCtx.
        unsafe {
            self.PORTC.portc().write(|w| {
                w.bits(
                    pin_pullup(0) | // DNC
                    pin_floating(1) | // Moisture sensor, ADC1
                    pin_low(2) | // Moisture sensor enable
                    pin_pullup(3) | // DNC
                    pin_pullup(4) | // DNC
                    pin_pullup(5) | // DNC
                    pin_floating(6), // RESET
                )
            });
            self.PORTC.ddrc().write(|w| {
                w.bits(
                    pin_input(0) | // DNC
                    pin_input(1) | // Moisture sensor, ADC1
                    pin_output(2) | // Moisture sensor enable
                    pin_input(3) | // DNC
                    pin_input(4) | // DNC
                    pin_input(5) | // DNC
                    pin_input(6), // RESET
                )
            });
        }
    }
}

impl PortD {
    pub fn setup(&self, _: &InitCtx<'_>) {
        // SAFETY: Called with interrupts disabled. Ensured by &InitCtx.
        unsafe {
            self.PORTD.portd().write(|w| {
                w.bits(
                    pin_pullup(0) | // UART RXD
                    pin_high(1) | // UART TXD
                    pin_pullup(2) | // DNC
                    pin_pullup(3) | // DNC
                    pin_low(4) | // Stepper orange
                    pin_low(5) | // Stepper yellow
                    pin_low(6) | // Stepper pink
                    pin_low(7), // Stepper blue
                )
            });
            self.PORTD.ddrd().write(|w| {
                w.bits(
                    pin_input(0) | // UART RXD
                    pin_output(1) | // UART TXD
                    pin_input(2) | // DNC
                    pin_input(3) | // DNC
                    pin_output(4) | // Stepper orange
                    pin_output(5) | // Stepper yellow
                    pin_output(6) | // Stepper pink
                    pin_output(7), // Stepper blue
                )
            });
        }
    }
}

// vim: ts=4 sw=4 expandtab
