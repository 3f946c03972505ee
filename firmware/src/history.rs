// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use avr_context::{MainCtx, MainCtxCell};

/// Fixed size history. Index 0 is the oldest entry.
pub struct History<const SIZE: usize> {
    hist: [MainCtxCell<u16>; SIZE],
}

impl<const SIZE: usize> History<SIZE> {
    pub const fn new() -> Self {
        Self {
            hist: [const { MainCtxCell::new(0) }; SIZE],
        }
    }

    pub fn push_back(&self, m: &MainCtx<'_>, new: u16) {
        for i in 1..SIZE {
            self.hist[i - 1].set(m, self.hist[i].get(m))
        }
        self.hist[SIZE - 1].set(m, new);
    }

    /// Serialize the history as little endian words, oldest first.
    #[cfg_attr(not(feature = "link"), allow(dead_code))]
    pub fn write_le(&self, m: &MainCtx<'_>, buf: &mut [u8]) {
        for (hist, chunk) in self.hist.iter().zip(buf.chunks_exact_mut(2)) {
            chunk.copy_from_slice(&hist.get(m).to_le_bytes());
        }
    }
}

// vim: ts=4 sw=4 expandtab
