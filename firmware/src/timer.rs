// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::hw::mcu;
use avr_context::{InitCtx, InitCtxCell, MainCtx, MainCtxCell};

#[allow(non_snake_case)]
pub struct Dp {
    pub TC1: mcu::TC1,
}

// SAFETY: Is initialized when constructing the MainCtx.
pub static DP: InitCtxCell<Dp> = unsafe { InitCtxCell::uninit() };

/// 64 us per timer tick.
pub const TIMER_TICK_US: u32 = 64;

/// One second of uptime.
pub const SECOND_US: u32 = 1_000_000;

impl Dp {
    #[rustfmt::skip]
    pub fn setup(&self, _c: &InitCtx<'_>) {
        // Timer 1 configuration:
        // Normal mode, free running.
        // CS: 1024 -> 64 us per timer tick.
        self.TC1.tccr1a().write(|w| w);
        self.TC1.tccr1c().write(|w| w);
        self.TC1.timsk1().write(|w| w);
        self.TC1.tcnt1().write(|w| w.set(0));
        self.TC1.tccr1b().write(|w| w.cs1().prescale_1024());
    }
}

/// Get the current timer count.
///
/// This is an atomic read-only access of the 16 bit counter.
/// It may be called from any context.
#[inline(never)]
pub fn timer_get() -> Timestamp {
    DP.TC1.tcnt1().read().bits().into()
}

macro_rules! impl_timestamp {
    ($rel:ident, $abs:ident, $reltype:ty, $abstype:ty, $tick_us:expr) => {
        #[derive(PartialEq, Eq, Copy, Clone, Debug)]
        pub struct $abs(pub $abstype);

        #[allow(dead_code)]
        impl $abs {
            #[inline]
            pub const fn new() -> Self {
                $abs(0)
            }
        }

        impl Default for $abs {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl Ord for $abs {
            #[inline]
            fn cmp(&self, other: &Self) -> core::cmp::Ordering {
                if self.0 == other.0 {
                    core::cmp::Ordering::Equal
                } else if self.0.wrapping_sub(other.0) & (1 << (<$abstype>::BITS - 1)) == 0 {
                    core::cmp::Ordering::Greater
                } else {
                    core::cmp::Ordering::Less
                }
            }
        }

        impl PartialOrd for $abs {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl core::ops::Add<$rel> for $abs {
            type Output = Self;

            #[inline]
            fn add(self, other: $rel) -> Self::Output {
                self.0.wrapping_add(other.0 as $abstype).into()
            }
        }

        impl core::ops::Sub for $abs {
            type Output = $rel;

            #[inline]
            fn sub(self, other: Self) -> Self::Output {
                (self.0.wrapping_sub(other.0) as $reltype).into()
            }
        }

        impl From<$abstype> for $abs {
            #[inline]
            fn from(stamp: $abstype) -> Self {
                $abs(stamp)
            }
        }

        impl From<$abs> for $abstype {
            #[inline]
            fn from(stamp: $abs) -> Self {
                stamp.0
            }
        }

        #[derive(PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Debug)]
        pub struct $rel(pub $reltype);

        #[allow(dead_code)]
        impl $rel {
            #[inline]
            pub const fn new() -> Self {
                $rel(0)
            }

            #[inline]
            pub const fn from_ticks(ticks: $reltype) -> Self {
                $rel(ticks)
            }

            #[inline]
            pub const fn from_millis(ms: i32) -> $rel {
                $rel(((ms as i64 * 1000) / $tick_us as i64) as $reltype)
            }

            #[inline]
            pub const fn from_secs(s: i32) -> $rel {
                $rel(((s as i64 * 1_000_000) / $tick_us as i64) as $reltype)
            }
        }

        impl Default for $rel {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$reltype> for $rel {
            #[inline]
            fn from(relstamp: $reltype) -> Self {
                $rel(relstamp)
            }
        }
    };
}

impl_timestamp!(RelTimestamp, Timestamp, i16, u16, TIMER_TICK_US);
impl_timestamp!(RelSeconds, Seconds, i32, u32, SECOND_US);

/// Uptime in seconds, derived from the timer.
///
/// [Uptime::run] must be called at least once per second.
pub struct Uptime {
    next: MainCtxCell<Timestamp>,
    secs: MainCtxCell<Seconds>,
}

const ONE_SECOND: RelTimestamp = RelTimestamp::from_secs(1);

impl Uptime {
    pub const fn new() -> Self {
        Self {
            next: MainCtxCell::new(Timestamp::new()),
            secs: MainCtxCell::new(Seconds::new()),
        }
    }

    pub fn init(&self, m: &MainCtx<'_>) {
        self.next.set(m, timer_get() + ONE_SECOND);
    }

    pub fn run(&self, m: &MainCtx<'_>) {
        let now = timer_get();
        let mut next = self.next.get(m);
        while now >= next {
            next = next + ONE_SECOND;
            self.secs.set(m, self.secs.get(m) + RelSeconds::from_ticks(1));
        }
        self.next.set(m, next);
    }

    pub fn now(&self, m: &MainCtx<'_>) -> Seconds {
        self.secs.get(m)
    }
}

// vim: ts=4 sw=4 expandtab
