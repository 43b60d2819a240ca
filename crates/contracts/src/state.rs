//! SourceState - lifecycle of an external audio source

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a source
///
/// `Initializing -> Live -> Ended`; `Ended` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    #[default]
    Initializing,
    Live,
    Ended,
}

impl SourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Live => 1,
            Self::Ended => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initializing,
            1 => Self::Live,
            _ => Self::Ended,
        }
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Live => "live",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Lock-free holder for a [`SourceState`].
///
/// Readers (e.g. `state()` queries from any thread) never block. Writers
/// that need the transition to be atomic with other bookkeeping must hold
/// their own lock around the store.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: SourceState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn load(&self) -> SourceState {
        SourceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `state` and return the previous one.
    pub fn swap(&self, state: SourceState) -> SourceState {
        SourceState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }
}
