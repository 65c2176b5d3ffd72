//! 日志初始化与时序客户端计数。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct CountersSnapshot {
    pub metrics_written: u64,
    pub metrics_skipped: u64,
    pub write_failures: u64,
    pub stream_entries_dropped: u64,
    pub trim_runs: u64,
    pub trim_failures: u64,
}

/// 时序客户端计数（进程级）。
pub struct TsdbCounters {
    metrics_written: AtomicU64,
    metrics_skipped: AtomicU64,
    write_failures: AtomicU64,
    stream_entries_dropped: AtomicU64,
    trim_runs: AtomicU64,
    trim_failures: AtomicU64,
}

impl TsdbCounters {
    pub fn new() -> Self {
        Self {
            metrics_written: AtomicU64::new(0),
            metrics_skipped: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            stream_entries_dropped: AtomicU64::new(0),
            trim_runs: AtomicU64::new(0),
            trim_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            metrics_written: self.metrics_written.load(Ordering::Relaxed),
            metrics_skipped: self.metrics_skipped.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            stream_entries_dropped: self.stream_entries_dropped.load(Ordering::Relaxed),
            trim_runs: self.trim_runs.load(Ordering::Relaxed),
            trim_failures: self.trim_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TsdbCounters {
    fn default() -> Self {
        Self::new()
    }
}

static COUNTERS: OnceLock<TsdbCounters> = OnceLock::new();

/// 获取全局计数实例。
pub fn counters() -> &'static TsdbCounters {
    COUNTERS.get_or_init(TsdbCounters::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录成功写入的 Metric 数量。
pub fn record_metrics_written(count: u64) {
    counters()
        .metrics_written
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录被跳过的 Metric（标签/字段为空或缺少设备标签）。
pub fn record_metric_skipped() {
    counters().metrics_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入失败次数。
pub fn record_write_failure() {
    counters().write_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录无法解析而丢弃的 Stream 条目。
pub fn record_stream_entry_dropped() {
    counters()
        .stream_entries_dropped
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录一次 Stream 清理任务执行。
pub fn record_trim_run() {
    counters().trim_runs.fetch_add(1, Ordering::Relaxed);
}

/// 记录 Stream 清理失败次数。
pub fn record_trim_failure() {
    counters().trim_failures.fetch_add(1, Ordering::Relaxed);
}
