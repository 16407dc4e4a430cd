//! Configuration for selecting a stack tracker.

use crate::{
    error::TrackerResult,
    meta::SymbolTable,
    stack::{NoopStackTracker, StackTrackerImpl, TraceableStackTracker},
    state::FPVMState,
};
use serde::{Deserialize, Serialize};

/// The [TrackerConfig] decides which [TraceableStackTracker] the emulator is wired with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Whether call-stack tracking is enabled. When disabled, a [NoopStackTracker] is used.
    pub debug: bool,
}

impl TrackerConfig {
    /// Builds the tracker selected by this config.
    ///
    /// ### Takes
    /// - `state`: A view of the emulator state.
    /// - `meta`: The program's symbol table. Only required when `debug` is set.
    ///
    /// ### Returns
    /// - The configured tracker, or [crate::TrackerError::InvalidConfiguration] if tracking is
    ///   enabled without a symbol table.
    pub fn build<'a, S, M>(
        &self,
        state: S,
        meta: Option<M>,
    ) -> TrackerResult<Box<dyn TraceableStackTracker + 'a>>
    where
        S: FPVMState + 'a,
        M: SymbolTable + 'a,
    {
        if !self.debug {
            return Ok(Box::new(NoopStackTracker));
        }

        tracing::info!(target: "howitzer::tracker", "Call-stack tracking enabled");
        Ok(Box::new(StackTrackerImpl::new(state, meta)?))
    }
}

#[cfg(test)]
mod test {
    use super::TrackerConfig;
    use crate::{
        error::TrackerError,
        meta::Meta,
        stack::StackTracker,
        state::State,
        test_utils::{fixture_meta, MAIN_MAIN},
    };

    #[test]
    fn config_defaults_to_disabled() {
        assert_eq!(serde_json::from_str::<TrackerConfig>("{}").unwrap(), TrackerConfig::default());
        assert!(serde_json::from_str::<TrackerConfig>(r#"{"debug":true}"#).unwrap().debug);
    }

    #[test]
    fn disabled_does_not_need_symbols() {
        let mut t = TrackerConfig::default().build(State::default(), None::<Meta>).unwrap();
        t.push_stack(MAIN_MAIN);
        t.pop_stack();
        t.pop_stack();
    }

    #[test]
    fn enabled_requires_symbols() {
        let err = TrackerConfig { debug: true }.build(State::default(), None::<Meta>).err();
        assert!(matches!(err, Some(TrackerError::InvalidConfiguration(_))));
    }

    #[test]
    fn enabled_builds_active_tracker() {
        let config = TrackerConfig { debug: true };
        assert!(config.build(State::default(), Some(fixture_meta())).is_ok());
    }
}
