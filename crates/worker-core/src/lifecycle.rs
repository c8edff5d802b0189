use std::{cell::Cell, fmt};

use serde::Serialize;
use tracing::trace;

use crate::error::WorkerError;

/// Where the worker is in its life. The host drives the transitions, the
/// worker only records what it has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Script evaluated, no lifecycle event seen yet. A worker restarted by
    /// the host between events is also here
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed or a newer worker took over
    Redundant,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Parsed, Installing) => true,
            (Installing, Installed) => true,
            // The host may have restarted us between install and activate
            (Parsed | Installed, Activating) => true,
            (Activating, Activated) => true,
            (Redundant, Redundant) => false,
            (_, Redundant) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Redundant
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LifecycleState::*;
        let s = match self {
            Parsed => "parsed",
            Installing => "installing",
            Installed => "installed",
            Activating => "activating",
            Activated => "activated",
            Redundant => "redundant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: Cell<LifecycleState>,
}

impl Lifecycle {
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Moves to `next`, returning the state it left
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, WorkerError> {
        let from = self.state.get();
        if !from.can_transition_to(next) {
            return Err(WorkerError::InvalidTransition { from, to: next });
        }
        trace!(%from, to = %next, "lifecycle");
        self.state.set(next);
        Ok(from)
    }
}

#[cfg(test)]
mod test {
    use super::{LifecycleState::*, *};

    #[test]
    fn test_happy_path() {
        let lifecycle = Lifecycle::default();
        for next in [Installing, Installed, Activating, Activated] {
            lifecycle.transition(next).unwrap();
        }
        assert_eq!(lifecycle.state(), Activated);
    }

    #[test]
    fn test_activate_after_restart() {
        let lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.transition(Activating).unwrap(), Parsed);
    }

    #[test]
    fn test_failed_install_is_terminal() {
        let lifecycle = Lifecycle::default();
        lifecycle.transition(Installing).unwrap();
        lifecycle.transition(Redundant).unwrap();
        assert!(lifecycle.state().is_terminal());

        let err = lifecycle.transition(Installing).unwrap_err();
        assert_eq!(err, WorkerError::InvalidTransition { from: Redundant, to: Installing });
        assert!(lifecycle.transition(Redundant).is_err());
    }

    #[test]
    fn test_no_reinstall_once_active() {
        let lifecycle = Lifecycle::default();
        lifecycle.transition(Activating).unwrap();
        lifecycle.transition(Activated).unwrap();
        assert!(lifecycle.transition(Installing).is_err());
        assert_eq!(lifecycle.state(), Activated);
    }
}
