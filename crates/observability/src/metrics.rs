//! 请求引擎与分发指标
//!
//! 指标名统一使用 `ext_audio_` 前缀，按 `source` 或 `sink` 打标签。
//! 未安装 recorder 时所有记录函数都是空操作。

use std::collections::HashMap;

use contracts::{AudioFrame, SourceState};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// Metric names
pub mod names {
    pub const REQUESTS_ISSUED: &str = "ext_audio_requests_issued_total";
    pub const REQUESTS_EVICTED: &str = "ext_audio_requests_evicted_total";
    pub const REQUESTS_COMPLETED: &str = "ext_audio_requests_completed_total";
    pub const COMPLETIONS_REJECTED: &str = "ext_audio_completions_rejected_total";
    pub const COMPLETION_LATENCY: &str = "ext_audio_completion_latency_ms";
    pub const LEDGER_DEPTH: &str = "ext_audio_ledger_depth";
    pub const PRODUCER_FAILURES: &str = "ext_audio_producer_failures_total";
    pub const STATE_TRANSITIONS: &str = "ext_audio_state_transitions_total";
    pub const FRAMES_DISPATCHED: &str = "ext_audio_frames_dispatched_total";
}

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(names::REQUESTS_ISSUED, "Frame requests issued by the scheduler");
    describe_counter!(
        names::REQUESTS_EVICTED,
        "Pending requests dropped because the ledger was full"
    );
    describe_counter!(names::REQUESTS_COMPLETED, "Completions matched against the ledger");
    describe_counter!(
        names::COMPLETIONS_REJECTED,
        "Completions refused (unknown request, invalid frame, ended source)"
    );
    describe_histogram!(
        names::COMPLETION_LATENCY,
        Unit::Milliseconds,
        "Time from request issue to completion"
    );
    describe_gauge!(names::LEDGER_DEPTH, "Pending requests after the last issue");
    describe_counter!(names::PRODUCER_FAILURES, "Errors or panics raised by producers");
    describe_counter!(names::STATE_TRANSITIONS, "Lifecycle transitions by target state");
    describe_counter!(names::FRAMES_DISPATCHED, "Per-sink frame deliveries by status");
}

/// One scheduler tick wrote a request into the ledger.
pub fn record_request_issued(source: &str, ledger_depth: usize) {
    counter!(names::REQUESTS_ISSUED, "source" => source.to_string()).increment(1);
    record_ledger_depth(source, ledger_depth);
}

pub fn record_request_evicted(source: &str) {
    counter!(names::REQUESTS_EVICTED, "source" => source.to_string()).increment(1);
}

/// A completion matched; `latency_ms` is measured from the issue time.
pub fn record_request_completed(source: &str, latency_ms: f64) {
    counter!(names::REQUESTS_COMPLETED, "source" => source.to_string()).increment(1);
    histogram!(names::COMPLETION_LATENCY, "source" => source.to_string()).record(latency_ms);
}

pub fn record_completion_rejected(source: &str, reason: &'static str) {
    counter!(
        names::COMPLETIONS_REJECTED,
        "source" => source.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_ledger_depth(source: &str, depth: usize) {
    gauge!(names::LEDGER_DEPTH, "source" => source.to_string()).set(depth as f64);
}

/// `frame_requested` returned an error or panicked.
pub fn record_producer_failure(source: &str) {
    counter!(names::PRODUCER_FAILURES, "source" => source.to_string()).increment(1);
}

pub fn record_state_transition(source: &str, state: SourceState) {
    counter!(
        names::STATE_TRANSITIONS,
        "source" => source.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Outcome of delivering one frame to one sink
pub fn record_frame_dispatched(sink_name: &str, success: bool) {
    let status = if success { "delivered" } else { "failed" };
    counter!(
        names::FRAMES_DISPATCHED,
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 帧流指标聚合器
///
/// 在内存中聚合分发出去的帧，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct FrameMetricsAggregator {
    /// 总帧数
    pub total_frames: u64,

    /// 总采样数 (每声道)
    pub total_samples: u64,

    /// 总字节数
    pub total_bytes: u64,

    /// 时间戳回退的帧数
    pub non_monotonic: u64,

    /// 相邻帧时间戳间隔 (毫秒)
    pub interval_stats: RunningStats,

    /// 完成延迟 (毫秒)
    pub latency_stats: RunningStats,

    /// 各格式出现次数，键为 "bits/rate/channels"
    pub format_counts: HashMap<String, u64>,

    last_timestamp_ms: Option<i64>,
}

impl FrameMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, frame: &AudioFrame, timestamp_ms: i64) {
        self.total_frames += 1;
        self.total_samples += frame.sample_count as u64;
        self.total_bytes += frame.data.len() as u64;

        if let Some(last) = self.last_timestamp_ms {
            if timestamp_ms < last {
                self.non_monotonic += 1;
            } else {
                self.interval_stats.push((timestamp_ms - last) as f64);
            }
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        let key = format!(
            "{}/{}/{}",
            frame.bits_per_sample, frame.sample_rate_hz, frame.channel_count
        );
        *self.format_counts.entry(key).or_insert(0) += 1;
    }

    /// 记录一次完成延迟
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.latency_stats.push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            total_samples: self.total_samples,
            total_bytes: self.total_bytes,
            non_monotonic: self.non_monotonic,
            frame_interval_ms: StatsSummary::from(&self.interval_stats),
            completion_latency_ms: StatsSummary::from(&self.latency_stats),
            format_counts: self.format_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub total_samples: u64,
    pub total_bytes: u64,
    pub non_monotonic: u64,
    pub frame_interval_ms: StatsSummary,
    pub completion_latency_ms: StatsSummary,
    pub format_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Frame Metrics Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Total samples: {}", self.total_samples)?;
        writeln!(f, "Total bytes: {}", self.total_bytes)?;
        writeln!(f, "Non-monotonic timestamps: {}", self.non_monotonic)?;
        writeln!(f, "Frame interval (ms): {}", self.frame_interval_ms)?;
        writeln!(f, "Completion latency (ms): {}", self.completion_latency_ms)?;

        if !self.format_counts.is_empty() {
            writeln!(f, "Formats (bits/rate/channels):")?;
            let mut formats: Vec<_> = self.format_counts.iter().collect();
            formats.sort();
            for (format, count) in formats {
                writeln!(f, "  {}: {}", format, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
