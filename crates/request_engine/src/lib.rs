//! # Request Engine
//!
//! 外部音频源的帧请求引擎。
//!
//! 负责：
//! - 周期性调度帧请求 (线程定时器 / tokio 定时器)
//! - 有界待处理请求账本 (满时淘汰最旧请求)
//! - 完成匹配：累积清除，以请求发出时间戳为准
//! - 生命周期：Initializing → Live → Ended
//!
//! ## 使用示例
//!
//! ```ignore
//! use request_engine::ExternalAudioSource;
//!
//! let source = ExternalAudioSource::new(producer, "synthetic")?;
//! source.add_sink(&sink);
//! source.start_capture()?;
//!
//! // Producer side, possibly on another thread
//! request.complete(&frame)?;
//!
//! source.stop_capture();
//! ```

pub mod clock;
mod ledger;
mod source;
mod stats;
mod timer;

pub use ledger::{Completed, Issued, RequestEntry, RequestLedger};
pub use source::ExternalAudioSource;
pub use stats::{SourceStats, SourceStatsSnapshot};
pub use timer::{build_tick_source, RuntimeTimer, ThreadTimer, TickCallback, TickSource};

// Re-export contracts types
pub use contracts::{
    AudioFrame, DispatchReport, FrameProducer, FrameRequest, SourceConfig, SourceState, TimerKind,
    MAX_PENDING_REQUEST_COUNT,
};
