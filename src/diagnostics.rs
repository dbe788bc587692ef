//! 定义 fanlog 输出路由器的内部诊断与指标。
//!
//! 此模块提供对各个 sink 写入情况与自动关闭次数的可观测性。

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 内部诊断与指标数据结构。
///
/// 使用原子操作确保线程安全。
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// 启动时间
    start_time: Option<Instant>,

    /// 控制台写入次数
    console_writes: AtomicU64,

    /// 文件写入次数
    file_writes: AtomicU64,

    /// 已发送邮件数
    emails_sent: AtomicU64,

    /// 数据库表插入次数
    table_inserts: AtomicU64,

    /// 数据库表更新次数
    table_updates: AtomicU64,

    /// 因连接失败被自动关闭的 sink 数
    sinks_disabled: AtomicU64,

    /// 各个 Sink 的错误计数
    sink_errors: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    pub uptime: Option<Duration>,
    pub console_writes: u64,
    pub file_writes: u64,
    pub emails_sent: u64,
    pub table_inserts: u64,
    pub table_updates: u64,
    pub sinks_disabled: u64,
    pub sink_errors: u64,
}

impl Diagnostics {
    /// 创建新的诊断实例。
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn increment_console_writes(&self) {
        self.console_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_file_writes(&self) {
        self.file_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_emails_sent(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_table_inserts(&self) {
        self.table_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_table_updates(&self) {
        self.table_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sinks_disabled(&self) {
        self.sinks_disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sink_errors(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取诊断数据的快照。
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            uptime: self.start_time.map(|start| start.elapsed()),
            console_writes: self.console_writes.load(Ordering::Relaxed),
            file_writes: self.file_writes.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            table_inserts: self.table_inserts.load(Ordering::Relaxed),
            table_updates: self.table_updates.load(Ordering::Relaxed),
            sinks_disabled: self.sinks_disabled.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器（主要用于测试）。
    pub fn reset(&self) {
        self.console_writes.store(0, Ordering::Relaxed);
        self.file_writes.store(0, Ordering::Relaxed);
        self.emails_sent.store(0, Ordering::Relaxed);
        self.table_inserts.store(0, Ordering::Relaxed);
        self.table_updates.store(0, Ordering::Relaxed);
        self.sinks_disabled.store(0, Ordering::Relaxed);
        self.sink_errors.store(0, Ordering::Relaxed);
    }
}

/// 全局诊断实例
static GLOBAL_DIAGNOSTICS: Lazy<Diagnostics> = Lazy::new(Diagnostics::new);

/// 获取全局诊断实例的引用。
pub fn diagnostics() -> &'static Diagnostics {
    &GLOBAL_DIAGNOSTICS
}

/// 获取全局诊断数据快照
pub fn get_diagnostics() -> DiagnosticsSnapshot {
    GLOBAL_DIAGNOSTICS.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_diagnostics_creation() {
        let diagnostics = Diagnostics::new();
        let snapshot = diagnostics.snapshot();

        assert!(snapshot.uptime.is_some());
        assert_eq!(snapshot.console_writes, 0);
        assert_eq!(snapshot.sinks_disabled, 0);
    }

    #[test]
    fn test_all_counter_types() {
        let diagnostics = Diagnostics::new();

        diagnostics.increment_console_writes();
        diagnostics.increment_file_writes();
        diagnostics.increment_emails_sent();
        diagnostics.increment_table_inserts();
        diagnostics.increment_table_updates();
        diagnostics.increment_sinks_disabled();
        diagnostics.increment_sink_errors();

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.console_writes, 1);
        assert_eq!(snapshot.file_writes, 1);
        assert_eq!(snapshot.emails_sent, 1);
        assert_eq!(snapshot.table_inserts, 1);
        assert_eq!(snapshot.table_updates, 1);
        assert_eq!(snapshot.sinks_disabled, 1);
        assert_eq!(snapshot.sink_errors, 1);

        diagnostics.reset();
        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot.file_writes, 0);
        assert_eq!(snapshot.sink_errors, 0);
    }

    #[test]
    fn test_concurrent_access() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let diagnostics_clone = diagnostics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    diagnostics_clone.increment_file_writes();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.snapshot().file_writes, 800);
    }

    #[test]
    fn test_global_instance_is_shared() {
        let before = get_diagnostics().emails_sent;
        diagnostics().increment_emails_sent();
        assert!(get_diagnostics().emails_sent > before);
    }
}
