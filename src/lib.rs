//! fanlog - 结构化日志记录的扇出输出路由器
//!
//! 一次写入被分发到控制台和文件（以及预留的 HTML 输出），邮件和数据库表
//! 由所属日志器在需要时显式调用。每个 sink 独立开关、独立配置，并各自
//! 管理自己的资源：文件句柄、SMTP 会话和数据库连接。
//!
//! 所有操作都是同步阻塞的；需要多线程共享时由调用方在外部加锁。
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use fanlog::{OutputRouter, OwnerLink};
//!
//! fn main() -> fanlog::Result<()> {
//!     let config = fanlog::load_config_from_str(
//!         r#"
//!         [path]
//!         directory = "logs"
//!         filename = "{owner}_{datetime}"
//!         "#,
//!     )?;
//!
//!     let mut router = OutputRouter::new(OwnerLink::detached(), &config)?;
//!     router.write("INFO\tservice started\n")?;
//!     Ok(())
//! }
//! ```
//!
//! # 连接失败策略
//!
//! 邮件与数据库表连接失败时默认关闭对应 sink 并通过 [`LogOwner::warning`]
//! 回报；`failure_policy = "Strict"` 时错误直接返回给调用方。

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod owner;
pub mod record;
pub mod router;
pub mod sinks;
pub mod utils;

// 重新导出主要类型
pub use config::{
    load_config_from_file, load_config_from_str, load_config_layered, validate_config,
    FailurePolicy, FileConfig, OutputConfig, Recipients, SmtpConfig, TableConfig,
};
pub use diagnostics::{get_diagnostics, DiagnosticsSnapshot};
pub use error::{FanlogError, Result};
pub use owner::{LogOwner, OwnerLink};
pub use record::Render;
pub use router::OutputRouter;
pub use sinks::{
    ConsoleSink, EmailMessage, EmailSink, FieldValue, FieldValues, FileSink, HtmlSink,
    MemoryDatabase, Output, SinkKind, SinkMetadata, TableOptions, TableSink, TextPart,
};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
