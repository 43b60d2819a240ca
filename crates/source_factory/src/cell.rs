//! Shared factory with init-on-first-use

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

use crate::factory::GlobalFactory;

/// Hands out one shared [`GlobalFactory`] at a time.
///
/// The cell only keeps a `Weak`: the factory is created by the first
/// `acquire` and torn down when the last `Arc` is released. A later
/// `acquire` creates a fresh one.
#[derive(Debug, Default)]
pub struct FactoryCell {
    inner: Mutex<Weak<GlobalFactory>>,
}

impl FactoryCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> Arc<GlobalFactory> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(factory) = inner.upgrade() {
            return factory;
        }
        let factory = Arc::new(GlobalFactory::new());
        *inner = Arc::downgrade(&factory);
        debug!("Global factory created");
        factory
    }

    /// The current factory, without creating one
    pub fn get(&self) -> Option<Arc<GlobalFactory>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }
}
