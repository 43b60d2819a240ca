//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the adapter: audio
//! frames, frame requests, producer and consumer traits, lifecycle state,
//! configuration and errors. Business crates depend on this crate only;
//! reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Request timestamps are milliseconds on the process monotonic clock
//!   (`request_engine::clock::now_ms`)
//! - The issue timestamp recorded by the source is authoritative for every
//!   dispatched frame

mod config;
mod error;
mod frame;
mod producer;
mod sink;
mod source_name;
mod state;

pub use config::*;
pub use error::*;
pub use frame::AudioFrame;
pub use producer::{FrameProducer, FrameRequest, RequestCompleter, RequestId};
pub use sink::*;
pub use source_name::SourceName;
pub use state::{SourceState, StateCell};
