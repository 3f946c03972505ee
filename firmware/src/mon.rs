// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{debug::Debug, hw::reset_system};
use avr_stack::estimate_unused_stack_space;

/// Minimum amount of CPU stack space that must be free all the time.
/// Immediate reset, if less stack space is free.
const MIN_STACK_SPACE: u16 = 64;

pub fn mon_check() {
    let unused_stack_bytes = estimate_unused_stack_space();
    Debug::MinStack.log_u16(unused_stack_bytes);
    if unused_stack_bytes < MIN_STACK_SPACE {
        reset_system();
    }
}

// vim: ts=4 sw=4 expandtab
