// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::hw::mcu;
use avr_context::{InitCtx, MainCtx, MainCtxCell};

#[allow(non_snake_case)]
pub struct AdcPeriph {
    pub ADC: mcu::ADC,
}

/// Moisture sensor converter on ADC1.
pub struct Adc {
    running: MainCtxCell<bool>,
}

impl Adc {
    pub const fn new() -> Self {
        Self {
            running: MainCtxCell::new(false),
        }
    }

    #[rustfmt::skip]
    pub fn init(&self, _c: &InitCtx<'_>, ap: &AdcPeriph) {
        ap.ADC.didr0().write(|w| w.adc1d().set_bit());
        ap.ADC.admux().write(|w| w.refs().avcc().mux().adc1());
        ap.ADC.adcsra().write(|w| {
            w.adps().prescaler_128()
             .adie().clear_bit()
             .adif().set_bit()
             .adsc().clear_bit()
             .aden().set_bit()
        });
    }

    #[rustfmt::skip]
    #[inline]
    fn start_conversion(&self, ap: &AdcPeriph) {
        ap.ADC.adcsra().modify(|_, w| {
            w.adif().set_bit()
             .adsc().set_bit()
        });
    }

    #[inline]
    fn conversion_done(&self, ap: &AdcPeriph) -> bool {
        ap.ADC.adcsra().read().adif().bit_is_set()
    }

    /// Start a new conversion, if none is running.
    pub fn start(&self, m: &MainCtx<'_>, ap: &AdcPeriph) {
        if !self.running.get(m) {
            self.start_conversion(ap);
            self.running.set(m, true);
        }
    }

    /// Get the result of the running conversion, if it has finished.
    pub fn poll(&self, m: &MainCtx<'_>, ap: &AdcPeriph) -> Option<u16> {
        if self.running.get(m) && self.conversion_done(ap) {
            self.running.set(m, false);
            Some(ap.ADC.adc().read().bits())
        } else {
            None
        }
    }
}

// vim: ts=4 sw=4 expandtab
