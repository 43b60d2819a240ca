//! Generation-checked source handles

use std::fmt;

/// Opaque reference to a source owned by a [`GlobalFactory`](crate::GlobalFactory).
///
/// A slot index plus the generation the slot had when the handle was
/// minted. Once the slot is freed the handle goes stale, even if the index
/// is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceHandle {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

impl SourceHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}
