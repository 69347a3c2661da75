//! 定义 QuantumEmit 的内部诊断与指标。
//!
//! 此模块提供了对 flush 管道健康状况和吞吐量的可观测性。

use crate::sinks::traits::FlushOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 内部诊断与指标数据结构。
///
/// 使用原子操作确保线程安全，不同实例的并发 flush 可以同时更新。
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// 系统启动时间
    start_time: Option<Instant>,

    /// 结果为 OK 的 flush 次数
    flushes_ok: AtomicU64,

    /// 结果为 RETRY 的 flush 次数
    flushes_retry: AtomicU64,

    /// 结果为 ERROR 的 flush 次数
    flushes_error: AtomicU64,

    /// 已格式化输出的记录数
    records_written: AtomicU64,

    /// 因结构错误被跳过的记录数
    records_skipped: AtomicU64,

    /// 已编码的指标上下文数
    contexts_encoded: AtomicU64,

    /// 写入文件的字节数
    bytes_written: AtomicU64,

    /// 通过 HTTP 发送的字节数（压缩后）
    bytes_sent: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsSnapshot {
    /// 系统运行时间
    pub uptime: Option<Duration>,
    pub flushes_ok: u64,
    pub flushes_retry: u64,
    pub flushes_error: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub contexts_encoded: u64,
    pub bytes_written: u64,
    pub bytes_sent: u64,
    /// flush 总次数
    pub total_flushes: u64,
    /// flush 成功率（百分比）
    pub success_rate_percent: f64,
}

impl Default for DiagnosticsSnapshot {
    fn default() -> Self {
        Self {
            uptime: None,
            flushes_ok: 0,
            flushes_retry: 0,
            flushes_error: 0,
            records_written: 0,
            records_skipped: 0,
            contexts_encoded: 0,
            bytes_written: 0,
            bytes_sent: 0,
            total_flushes: 0,
            success_rate_percent: 100.0,
        }
    }
}

impl Diagnostics {
    /// 创建新的诊断实例。
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// 记录一次 flush 的结果。
    pub fn record_flush(&self, outcome: FlushOutcome) {
        let counter = match outcome {
            FlushOutcome::Ok => &self.flushes_ok,
            FlushOutcome::Retry => &self.flushes_retry,
            FlushOutcome::Error => &self.flushes_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_written(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_skipped(&self, count: u64) {
        self.records_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_contexts_encoded(&self, count: u64) {
        self.contexts_encoded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes_written(&self, count: u64) {
        self.bytes_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, count: u64) {
        self.bytes_sent.fetch_add(count, Ordering::Relaxed);
    }

    /// 获取诊断数据的快照。
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let flushes_ok = self.flushes_ok.load(Ordering::Relaxed);
        let flushes_retry = self.flushes_retry.load(Ordering::Relaxed);
        let flushes_error = self.flushes_error.load(Ordering::Relaxed);
        let total_flushes = flushes_ok + flushes_retry + flushes_error;

        let success_rate_percent = if total_flushes > 0 {
            (flushes_ok as f64 / total_flushes as f64) * 100.0
        } else {
            100.0
        };

        DiagnosticsSnapshot {
            uptime: self.start_time.map(|start| start.elapsed()),
            flushes_ok,
            flushes_retry,
            flushes_error,
            records_written: self.records_written.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            contexts_encoded: self.contexts_encoded.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            total_flushes,
            success_rate_percent,
        }
    }

    /// 重置所有计数器（主要用于测试）。
    pub fn reset(&self) {
        for counter in [
            &self.flushes_ok,
            &self.flushes_retry,
            &self.flushes_error,
            &self.records_written,
            &self.records_skipped,
            &self.contexts_encoded,
            &self.bytes_written,
            &self.bytes_sent,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 全局诊断实例，使用 Arc 包装以支持多线程访问。
static GLOBAL_DIAGNOSTICS: std::sync::OnceLock<Arc<Diagnostics>> = std::sync::OnceLock::new();

/// 初始化全局诊断实例，重复调用返回同一个实例。
pub fn init_diagnostics() -> Arc<Diagnostics> {
    GLOBAL_DIAGNOSTICS
        .get_or_init(|| Arc::new(Diagnostics::new()))
        .clone()
}

/// 获取全局诊断实例的引用。
///
/// 如果诊断系统尚未初始化，返回 None。
pub fn get_diagnostics_instance() -> Option<Arc<Diagnostics>> {
    GLOBAL_DIAGNOSTICS.get().cloned()
}

/// 获取诊断数据快照
///
/// 如果诊断系统尚未初始化，返回默认的快照。
pub fn get_diagnostics() -> DiagnosticsSnapshot {
    match GLOBAL_DIAGNOSTICS.get() {
        Some(diagnostics) => diagnostics.snapshot(),
        None => DiagnosticsSnapshot::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_diagnostics_creation() {
        let diagnostics = Diagnostics::new();
        let snapshot = diagnostics.snapshot();

        assert!(snapshot.uptime.is_some());
        assert_eq!(snapshot.total_flushes, 0);
        assert_eq!(snapshot.records_written, 0);
        assert_eq!(snapshot.success_rate_percent, 100.0);
    }

    #[test]
    fn test_flush_outcomes_and_rate() {
        let diagnostics = Diagnostics::new();

        for _ in 0..8 {
            diagnostics.record_flush(FlushOutcome::Ok);
        }
        diagnostics.record_flush(FlushOutcome::Retry);
        diagnostics.record_flush(FlushOutcome::Error);

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.flushes_ok, 8);
        assert_eq!(snapshot.flushes_retry, 1);
        assert_eq!(snapshot.flushes_error, 1);
        assert_eq!(snapshot.total_flushes, 10);
        assert_eq!(snapshot.success_rate_percent, 80.0);
    }

    #[test]
    fn test_reset_functionality() {
        let diagnostics = Diagnostics::new();

        diagnostics.add_records_written(3);
        diagnostics.add_bytes_sent(128);
        diagnostics.record_flush(FlushOutcome::Ok);
        assert_eq!(diagnostics.snapshot().records_written, 3);

        diagnostics.reset();

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.records_written, 0);
        assert_eq!(snapshot.bytes_sent, 0);
        assert_eq!(snapshot.total_flushes, 0);
    }

    #[test]
    fn test_concurrent_access() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        // 启动多个线程同时增加计数器
        for _ in 0..10 {
            let diagnostics_clone = diagnostics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    diagnostics_clone.add_bytes_written(2);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.snapshot().bytes_written, 2000);
    }

    #[test]
    fn test_global_diagnostics_initialization() {
        let diagnostics1 = init_diagnostics();
        let diagnostics2 = init_diagnostics();

        // 应该返回同一个实例
        assert!(Arc::ptr_eq(&diagnostics1, &diagnostics2));
        assert!(get_diagnostics_instance().is_some());
        assert!(get_diagnostics().uptime.is_some());
    }
}
