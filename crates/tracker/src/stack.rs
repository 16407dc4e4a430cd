//! This module contains the stack trackers, which keep a shadow model of the emulated program's
//! call stack for diagnostics.

use crate::{
    error::{TrackerError, TrackerResult},
    meta::SymbolTable,
    state::FPVMState,
    types::Address,
};
use std::io::{self, Stdout, Write};

/// The [StackTracker] receives the control transfers observed by the emulator's dispatch loop.
pub trait StackTracker {
    /// Records a call into `target`.
    fn push_stack(&mut self, target: Address);

    /// Records a return.
    fn pop_stack(&mut self);
}

/// A [StackTracker] that can also print a traceback of the calls it believes are active.
pub trait TraceableStackTracker: StackTracker {
    /// Prints the current model, most recent call first.
    fn traceback(&mut self);
}

impl<T: StackTracker + ?Sized> StackTracker for Box<T> {
    fn push_stack(&mut self, target: Address) {
        (**self).push_stack(target)
    }

    fn pop_stack(&mut self) {
        (**self).pop_stack()
    }
}

impl<T: TraceableStackTracker + ?Sized> TraceableStackTracker for Box<T> {
    fn traceback(&mut self) {
        (**self).traceback()
    }
}

impl<T: StackTracker + ?Sized> StackTracker for &mut T {
    fn push_stack(&mut self, target: Address) {
        (**self).push_stack(target)
    }

    fn pop_stack(&mut self) {
        (**self).pop_stack()
    }
}

impl<T: TraceableStackTracker + ?Sized> TraceableStackTracker for &mut T {
    fn traceback(&mut self) {
        (**self).traceback()
    }
}

/// The [NoopStackTracker] is used when debugging is disabled. Every operation does nothing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoopStackTracker;

impl StackTracker for NoopStackTracker {
    #[inline(always)]
    fn push_stack(&mut self, _: Address) {}

    #[inline(always)]
    fn pop_stack(&mut self) {}
}

impl TraceableStackTracker for NoopStackTracker {
    #[inline(always)]
    fn traceback(&mut self) {}
}

/// A single call recorded by the [StackTrackerImpl].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// The address that was called into.
    pub target: Address,
    /// The program counter at the time of the call.
    pub caller: Address,
}

/// The [StackTrackerImpl] maintains the shadow call stack.
///
/// Calls and returns are not always paired in the guest program: when the compiler inlines a
/// function, its caller may return without the callee ever having returned. On a return whose
/// destination does not match the top frame, the tracker walks down the model looking for the
/// most recent frame that entered the current function and drops it along with everything above
/// it. If no such frame exists the model is left alone.
///
/// Diagnostics are written to `W`, which is [Stdout] unless constructed with
/// [StackTrackerImpl::with_output].
#[derive(Debug)]
pub struct StackTrackerImpl<S, M, W = Stdout>
where
    S: FPVMState,
    M: SymbolTable,
    W: Write,
{
    /// A view of the emulator state, read at the time of each operation.
    state: S,
    /// The symbol table used to resolve call targets.
    meta: M,
    /// The calls believed to be active, oldest first.
    frames: Vec<Frame>,
    /// The diagnostic output sink.
    out: W,
}

impl<S, M> StackTrackerImpl<S, M>
where
    S: FPVMState,
    M: SymbolTable,
{
    /// Create a new [StackTrackerImpl] that writes diagnostics to stdout.
    ///
    /// ### Returns
    /// - [TrackerError::InvalidConfiguration] if `meta` is [None].
    pub fn new(state: S, meta: Option<M>) -> TrackerResult<Self> {
        Self::with_output(state, meta, io::stdout())
    }
}

impl<S, M, W> StackTrackerImpl<S, M, W>
where
    S: FPVMState,
    M: SymbolTable,
    W: Write,
{
    /// Create a new [StackTrackerImpl] that writes diagnostics to `out`.
    ///
    /// ### Returns
    /// - [TrackerError::InvalidConfiguration] if `meta` is [None].
    pub fn with_output(state: S, meta: Option<M>, out: W) -> TrackerResult<Self> {
        let meta = meta.ok_or(TrackerError::InvalidConfiguration("symbol table is absent"))?;
        Ok(Self { state, meta, frames: Vec::new(), out })
    }

    /// Returns the modelled frames, oldest first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Returns the number of modelled frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no calls are modelled.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Returns a reference to the diagnostic output sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Consumes the tracker and returns the diagnostic output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Writes `msg` to the output sink. Failures are logged and otherwise ignored; diagnostics
    /// must never disturb the emulator.
    fn emit(&mut self, msg: &str) {
        if let Err(e) = self.out.write_all(msg.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::error!(target: "howitzer::tracker", "Failed to write diagnostic output: {e}");
        }
    }
}

impl<S, M, W> StackTracker for StackTrackerImpl<S, M, W>
where
    S: FPVMState,
    M: SymbolTable,
    W: Write,
{
    fn push_stack(&mut self, target: Address) {
        self.frames.push(Frame { target, caller: self.state.pc() });
    }

    fn pop_stack(&mut self) {
        if self.frames.is_empty() {
            // Returning through a call made before tracking began, or an earlier repair
            // discarded too much.
            let (pc, step) = (self.state.pc(), self.state.step());
            tracing::warn!(target: "howitzer::tracker", "Stack underflow at pc=0x{pc:x}, step={step}");
            self.emit(&format!("ERROR: stack underflow at pc={pc:x}. step={step}\n"));
            return;
        }

        let pc = self.state.pc();
        let top = self.frames[self.frames.len() - 1].target;
        let func = self.meta.lookup_symbol(pc);

        if func == self.meta.lookup_symbol(top) {
            self.frames.pop();
            return;
        }

        // Most likely the function was inlined. Snap back to the last call into `func`.
        let meta = &self.meta;
        let matched = self.frames.iter().rposition(|frame| meta.lookup_symbol(frame.target) == func);
        match matched {
            Some(i) => self.frames.truncate(i),
            None => tracing::debug!(
                target: "howitzer::tracker",
                "No frame matches return into {func} at pc=0x{pc:x}, step={}; leaving {} frames in place",
                self.state.step(),
                self.frames.len()
            ),
        }
    }
}

impl<S, M, W> TraceableStackTracker for StackTrackerImpl<S, M, W>
where
    S: FPVMState,
    M: SymbolTable,
    W: Write,
{
    fn traceback(&mut self) {
        let mut msg = format!("traceback at pc={:x}. step={}\n", self.state.pc(), self.state.step());
        for (idx, frame) in self.frames.iter().rev().enumerate() {
            msg.push_str(&format!(
                "\t{idx} {:x} in {} caller={:08x}\n",
                frame.target,
                self.meta.lookup_symbol(frame.target),
                frame.caller
            ));
        }
        self.emit(&msg);
    }
}
