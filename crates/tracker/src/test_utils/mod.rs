//! Testing utilities.

#![allow(missing_docs)]

use crate::{
    meta::{Meta, Symbol},
    state::{SharedState, State},
    types::Address,
};
use std::{cell::RefCell, rc::Rc};

pub const RUNTIME_MAIN: Address = 0x1000;
pub const MAIN_MAIN: Address = 0x2000;
pub const MAIN_INNER: Address = 0x3000;
pub const MAIN_LEAF: Address = 0x4000;

/// Size of every symbol in [fixture_meta].
pub const SYMBOL_SIZE: u64 = 0x100;

/// A small program layout: `runtime.main -> main.main -> main.inner -> main.leaf`.
pub fn fixture_meta() -> Meta {
    Meta::new(
        [
            ("runtime.main", RUNTIME_MAIN),
            ("main.main", MAIN_MAIN),
            ("main.inner", MAIN_INNER),
            ("main.leaf", MAIN_LEAF),
        ]
        .into_iter()
        .map(|(name, start)| Symbol { name: name.to_string(), start, size: SYMBOL_SIZE })
        .collect(),
    )
}

/// Creates a [SharedState] positioned at `pc`.
pub fn shared_state(pc: Address) -> SharedState<State> {
    Rc::new(RefCell::new(State { pc, step: 0 }))
}

/// Moves the emulator to `pc` and advances the step counter by one.
pub fn step_to(state: &SharedState<State>, pc: Address) {
    let mut s = state.borrow_mut();
    s.pc = pc;
    s.step += 1;
}
