// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    analog::{Adc, AdcPeriph},
    debug::Debug,
    history::History,
    mon::mon_check,
    ports::{PC_SENSOR_EN, PORTC},
    stepper::{Dir, Stepper},
    timer::{RelSeconds, Seconds, Uptime},
};
use avr_context::{InitCtx, MainCtx, MainCtxCell};

#[cfg(feature = "link")]
use crate::link::Link;

#[cfg(feature = "testing")]
use crate::ports::{PB_LED, PORTB};

/// Sensor readings above this level mean dry soil.
const MOIST_LEVEL: u16 = 750;

/// Sensor power up time before the measurement.
const SENSOR_SETTLE: RelSeconds = RelSeconds::from_secs(2);

/// Valve open time.
const WATERING_TIME: RelSeconds = RelSeconds::from_secs(5);

/// Stepper turns to fully open or close the valve.
const VALVE_TURNS: u8 = 4;

/// Time between two measurements.
#[cfg(not(feature = "testing"))]
const HOLD_TIME: RelSeconds = RelSeconds::from_secs(86400);
#[cfg(feature = "testing")]
const HOLD_TIME: RelSeconds = RelSeconds::from_secs(10);

/// Number of stored moisture readings.
pub const MOISTURE_HIST: usize = 32;

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
enum SysState {
    /// Waiting for the next measurement.
    Hold,
    /// Sensor is powered up.
    Settle,
    /// ADC conversion is running.
    Measure,
    /// Valve is opening.
    Opening,
    /// Valve is open.
    Watering,
    /// Valve is closing.
    Closing,
}

pub struct System {
    state: MainCtxCell<SysState>,
    until: MainCtxCell<Seconds>,
    uptime: Uptime,
    adc: Adc,
    valve: Stepper,
    moisture: History<MOISTURE_HIST>,
    #[cfg(feature = "link")]
    link: Link,
}

impl System {
    pub const fn new() -> Self {
        Self {
            state: MainCtxCell::new(SysState::Hold),
            until: MainCtxCell::new(Seconds::new()),
            uptime: Uptime::new(),
            adc: Adc::new(),
            valve: Stepper::new(),
            moisture: History::new(),
            #[cfg(feature = "link")]
            link: Link::new(),
        }
    }

    pub fn init(&self, c: &InitCtx<'_>, ap: &AdcPeriph) {
        self.adc.init(c, ap);
        let m = c.main_ctx();
        self.uptime.init(m);
        // Measure right after power on.
        self.until.set(m, self.uptime.now(m));
    }

    fn sensor_power(&self, on: bool) {
        PORTC.set(PC_SENSOR_EN, on);
    }

    fn set_state(&self, m: &MainCtx<'_>, state: SysState) {
        self.state.set(m, state);
        Debug::SysState.log_u8(state as u8);
    }

    fn hold(&self, m: &MainCtx<'_>, now: Seconds) {
        #[cfg(feature = "testing")]
        PORTB.toggle(PB_LED);

        self.until.set(m, now + HOLD_TIME);
        self.set_state(m, SysState::Hold);
    }

    pub fn run(&self, m: &MainCtx<'_>, ap: &AdcPeriph) {
        self.uptime.run(m);
        self.valve.run(m);

        let now = self.uptime.now(m);
        Debug::Uptime.log_u16(now.0 as u16);

        match self.state.get(m) {
            SysState::Hold => {
                if now >= self.until.get(m) {
                    self.sensor_power(true);
                    self.until.set(m, now + SENSOR_SETTLE);
                    self.set_state(m, SysState::Settle);
                }
            }
            SysState::Settle => {
                if now >= self.until.get(m) {
                    self.adc.start(m, ap);
                    self.set_state(m, SysState::Measure);
                }
            }
            SysState::Measure => {
                if let Some(moisture) = self.adc.poll(m, ap) {
                    self.sensor_power(false);
                    self.moisture.push_back(m, moisture);
                    Debug::Moisture.log_u16(moisture);

                    if moisture > MOIST_LEVEL {
                        // The soil is too dry.
                        self.valve.turn(m, Dir::Cw, VALVE_TURNS);
                        self.set_state(m, SysState::Opening);
                    } else {
                        self.hold(m, now);
                    }
                }
            }
            SysState::Opening => {
                if self.valve.is_idle(m) {
                    Debug::Valve.log_u8(1);
                    self.until.set(m, now + WATERING_TIME);
                    self.set_state(m, SysState::Watering);
                }
            }
            SysState::Watering => {
                if now >= self.until.get(m) {
                    self.valve.turn(m, Dir::Acw, VALVE_TURNS);
                    self.set_state(m, SysState::Closing);
                }
            }
            SysState::Closing => {
                if self.valve.is_idle(m) {
                    Debug::Valve.log_u8(0);
                    self.hold(m, now);
                }
            }
        }

        #[cfg(feature = "link")]
        self.link.run(m, now, &self.moisture);

        mon_check();
    }
}

// vim: ts=4 sw=4 expandtab
