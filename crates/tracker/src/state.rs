//! This module contains the view of the emulator state that the stack tracker reads from.

use crate::types::{Address, Step};
use serde::{Deserialize, Serialize};
use std::{cell::RefCell, rc::Rc};

/// The [FPVMState] trait exposes the parts of the MIPS emulator's state that the stack tracker
/// reads. Values are queried at the moment a tracker operation runs and never cached.
pub trait FPVMState {
    /// Returns the current program counter.
    fn pc(&self) -> Address;

    /// Returns the number of instructions executed so far.
    fn step(&self) -> Step;
}

/// The [State] struct is the minimal emulator state record that satisfies [FPVMState].
///
/// The emulator owns its full thread context elsewhere; this record exists so the tracker can be
/// driven by anything that knows its program counter and step count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// The current program counter. (Special purpose register $pc)
    pub pc: Address,
    /// The current step of the MIPS emulator.
    pub step: Step,
}

impl FPVMState for State {
    fn pc(&self) -> Address {
        self.pc
    }

    fn step(&self) -> Step {
        self.step
    }
}

/// An [FPVMState] with shared ownership, so the emulator may keep stepping while the tracker holds
/// a handle to the same state.
pub type SharedState<T> = Rc<RefCell<T>>;

impl<T: FPVMState> FPVMState for Rc<RefCell<T>> {
    fn pc(&self) -> Address {
        self.borrow().pc()
    }

    fn step(&self) -> Step {
        self.borrow().step()
    }
}

impl<T: FPVMState + ?Sized> FPVMState for &T {
    fn pc(&self) -> Address {
        (**self).pc()
    }

    fn step(&self) -> Step {
        (**self).step()
    }
}

impl<T: FPVMState + ?Sized> FPVMState for Box<T> {
    fn pc(&self) -> Address {
        (**self).pc()
    }

    fn step(&self) -> Step {
        (**self).step()
    }
}
