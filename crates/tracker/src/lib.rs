#![doc = include_str!("../README.md")]

pub mod types;

mod error;
pub use error::{TrackerError, TrackerResult};

pub mod state;

pub mod meta;

mod stack;
pub use stack::{Frame, NoopStackTracker, StackTracker, StackTrackerImpl, TraceableStackTracker};

mod config;
pub use config::TrackerConfig;

#[cfg(any(feature = "test-utils", test))]
pub mod test_utils;
