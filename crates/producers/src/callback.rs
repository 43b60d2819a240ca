//! Callback producer
//!
//! Wraps a closure invoked for every frame request. Whatever state the
//! callback needs (the "user data") is captured by the closure.

use std::fmt;
use std::sync::Arc;

use contracts::{ContractError, FrameProducer, FrameRequest};

type RequestCallback = dyn Fn(&FrameRequest) -> Result<(), ContractError> + Send + Sync;

#[derive(Clone)]
pub struct CallbackProducer {
    callback: Arc<RequestCallback>,
}

impl CallbackProducer {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&FrameRequest) -> Result<(), ContractError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackProducer").finish_non_exhaustive()
    }
}

impl FrameProducer for CallbackProducer {
    fn frame_requested(&self, request: &FrameRequest) -> Result<(), ContractError> {
        (self.callback)(request)
    }
}
