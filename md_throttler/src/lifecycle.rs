//! Three-state engine lifecycle held in a single atomic.
//!
//! `NotStarted -> Started -> Stopped`, with `NotStarted -> Stopped` allowed for an
//! engine that is dropped or stopped before it ever ran. There is no way back.

use std::sync::atomic::{AtomicU8, Ordering};
use strum_macros::Display;

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LifecycleState {
    /// Symbols and subscribers may still be loaded.
    NotStarted,
    /// Ingest accepted, controller running.
    Started,
    /// Controller halted; the cache remains readable.
    Stopped,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::NotStarted => 0,
            LifecycleState::Started => 1,
            LifecycleState::Stopped => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::NotStarted,
            1 => LifecycleState::Started,
            _ => LifecycleState::Stopped,
        }
    }
}

/// Shared lifecycle flag observed by every entry point and the controller loop.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// New lifecycle in `NotStarted`.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::NotStarted.as_u8()),
        }
    }

    /// Current phase.
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` while the engine is `Started`.
    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// Move `NotStarted -> Started`. Returns `false` from any other phase.
    pub fn start(&self) -> bool {
        self.transition(LifecycleState::NotStarted, LifecycleState::Started)
    }

    /// Move to `Stopped`, returning the phase that was left.
    pub fn stop(&self) -> LifecycleState {
        LifecycleState::from_u8(
            self.state
                .swap(LifecycleState::Stopped.as_u8(), Ordering::AcqRel),
        )
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
