use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::EngineProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready(EngineProfile),
    Failed(String),
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "initialising",
            EngineState::Ready(_) => "ready",
            EngineState::Failed(_) => "unavailable",
        }
    }
}

/// Engine initialisation state shared between the init thread and callers.
/// Leaves `Uninitialized` at most once.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<EngineState>,
    changed: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Uninitialized),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().is_ready()
    }

    /// Returns `false` if the state had already been settled.
    pub fn mark_ready(&self, profile: EngineProfile) -> bool {
        self.settle(EngineState::Ready(profile))
    }

    pub fn mark_failed(&self, reason: impl Into<String>) -> bool {
        self.settle(EngineState::Failed(reason.into()))
    }

    fn settle(&self, next: EngineState) -> bool {
        let mut state = self.state.lock();
        if *state != EngineState::Uninitialized {
            return false;
        }
        *state = next;
        self.changed.notify_all();
        true
    }

    /// Block until initialisation settles or `timeout` elapses. Returns
    /// whether the engine is ready.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == EngineState::Uninitialized {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.is_ready()
    }
}
