//! # Dispatcher
//!
//! 帧分发模块。
//!
//! 负责：
//! - 维护 sink / observer 注册表（非拥有引用）
//! - 将完成的 `AudioFrame` 同步 fan-out 到所有 sink
//! - 隔离失败的 sink，不中断其余投递
//! - 帧捕获文件格式（供回放）

pub mod capture;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod sinks;

pub use capture::{read_capture, CaptureReader, CaptureWriter, CapturedFrame};
pub use contracts::{AudioSink, DispatchReport, StateObserver, VolumeObserver};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, RegistryMetrics};
pub use registry::SinkRegistry;
pub use sinks::{build_sink, build_sinks, FileFormat, FileSink, FileSinkConfig, LogSink};
