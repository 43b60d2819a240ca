//! # Source Factory
//!
//! Lifecycle API for external audio sources.
//!
//! Responsibilities:
//! - Create sources and hand out generation-checked handles
//! - Explicit reference counting; the last release shuts the source down
//! - Create local audio tracks fed by a source
//! - Share one factory per process through [`FactoryCell`]
//!
//! ## Usage Example
//!
//! ```ignore
//! use source_factory::FactoryCell;
//!
//! let cell = FactoryCell::new();
//! let factory = cell.acquire();
//! let handle = factory.create_source(producer, "synthetic")?;
//! factory.finish_creation(handle)?;
//! let track = factory.create_audio_track(handle, "")?;
//! // ...
//! factory.remove_ref(handle)?;
//! ```

mod cell;
pub mod error;
mod factory;
mod handle;
mod track;

pub use cell::FactoryCell;
pub use error::{FactoryError, Result};
pub use factory::GlobalFactory;
pub use handle::SourceHandle;
pub use track::{FrameCallback, LocalAudioTrack};
