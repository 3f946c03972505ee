// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! BYJ48 stepper motor of the water valve.

use crate::{
    ports::{PD_STEPPER_MASK, PD_STEPPER_SHIFT, PORTD},
    timer::{RelTimestamp, Timestamp, timer_get},
};
use avr_context::{MainCtx, MainCtxCell};

/// Half step coil table, clockwise.
/// Bit 0: orange, bit 1: yellow, bit 2: pink, bit 3: blue.
const HALF_STEPS: [u8; 8] = [
    0b0001, 0b0011, 0b0010, 0b0110, 0b0100, 0b1100, 0b1000, 0b1001,
];

/// Full table passes per turn.
const PASSES_PER_TURN: u16 = 2;

/// Time between two half steps.
const STEP_TIME: RelTimestamp = RelTimestamp::from_millis(2);

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Dir {
    Cw,
    Acw,
}

pub struct Stepper {
    dir: MainCtxCell<Dir>,
    steps: MainCtxCell<u16>,
    phase: MainCtxCell<u8>,
    next: MainCtxCell<Timestamp>,
}

impl Stepper {
    pub const fn new() -> Self {
        Self {
            dir: MainCtxCell::new(Dir::Cw),
            steps: MainCtxCell::new(0),
            phase: MainCtxCell::new(0),
            next: MainCtxCell::new(Timestamp::new()),
        }
    }

    fn coils(&self, pattern: u8) {
        PORTD.write_masked(PD_STEPPER_MASK, pattern << PD_STEPPER_SHIFT);
    }

    /// Start turning the valve. Returns immediately.
    pub fn turn(&self, m: &MainCtx<'_>, dir: Dir, turns: u8) {
        self.dir.set(m, dir);
        self.steps
            .set(m, turns as u16 * PASSES_PER_TURN * HALF_STEPS.len() as u16);
        // Every pass starts at the first coil of the direction.
        self.phase.set(m, 0);
        self.next.set(m, timer_get());
    }

    pub fn is_idle(&self, m: &MainCtx<'_>) -> bool {
        self.steps.get(m) == 0
    }

    pub fn run(&self, m: &MainCtx<'_>) {
        let steps = self.steps.get(m);
        if steps == 0 {
            return;
        }
        let now = timer_get();
        if now < self.next.get(m) {
            return;
        }
        self.next.set(m, now + STEP_TIME);

        let phase = self.phase.get(m);
        let index = match self.dir.get(m) {
            Dir::Cw => phase,
            Dir::Acw => HALF_STEPS.len() as u8 - 1 - phase,
        };
        self.coils(HALF_STEPS[index as usize]);
        self.phase.set(m, (phase + 1) % HALF_STEPS.len() as u8);

        let steps = steps - 1;
        self.steps.set(m, steps);
        if steps == 0 {
            // Release the coils.
            self.coils(0);
        }
    }
}

// vim: ts=4 sw=4 expandtab
