//! Sink 公共接口
//!
//! 定义了所有输出目标共用的开关语义。
//!
//! # 架构设计
//!
//! - `Output`: 开关 trait，路由器与每个 sink 都实现它，关闭时所有修改操作都是无副作用的空操作
//! - `Sink`: 在 `Output` 之上增加种类与元数据，供路由器汇总状态
//!
//! # 使用示例
//!
//! ```rust
//! use fanlog::sinks::traits::{Output, Sink, SinkKind};
//! use fanlog::sinks::HtmlSink;
//!
//! let mut html = HtmlSink::new(false);
//! assert!(!html.status());
//! html.open();
//! assert_eq!(html.metadata().kind, SinkKind::Html);
//! assert!(html.metadata().enabled);
//! ```

use crate::config::FailurePolicy;
use crate::diagnostics::diagnostics;
use crate::error::{FanlogError, Result};
use crate::owner::OwnerLink;
use std::fmt;

/// 带开关的输出对象
///
/// 每个会修改状态或产生 I/O 的操作都通过 [`Output::guarded`] 执行：
/// 关闭时立即返回 `R::default()`，不产生任何副作用，也不返回错误。
pub trait Output {
    /// 当前是否启用
    fn status(&self) -> bool;

    /// 设置启用状态
    fn set_status(&mut self, enabled: bool);

    /// 启用
    fn open(&mut self) {
        self.set_status(true);
    }

    /// 关闭
    fn close(&mut self) {
        self.set_status(false);
    }

    /// 在启用时执行 `op`，关闭时直接返回默认值
    fn guarded<R, F>(&mut self, op: F) -> Result<R>
    where
        Self: Sized,
        R: Default,
        F: FnOnce(&mut Self) -> Result<R>,
    {
        if !self.status() {
            return Ok(R::default());
        }
        op(self)
    }
}

/// Sink 种类，集合固定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    File,
    Email,
    Html,
    Table,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Console => "console",
            SinkKind::File => "file",
            SinkKind::Email => "email",
            SinkKind::Html => "html",
            SinkKind::Table => "table",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个输出目标
pub trait Sink: Output {
    fn kind(&self) -> SinkKind;

    /// 获取 sink 的元数据
    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::new(self.kind()).with_enabled(self.status())
    }
}

/// Sink 元数据
///
/// 包含 sink 的基本信息和状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkMetadata {
    /// Sink 种类
    pub kind: SinkKind,
    /// 是否启用
    pub enabled: bool,
    /// 描述信息
    pub description: Option<String>,
}

impl SinkMetadata {
    /// 创建新的 sink 元数据
    pub fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            enabled: true,
            description: None,
        }
    }

    /// 设置描述信息
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 设置启用状态
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// 处理邮件与数据库表的连接类错误
///
/// 宽松策略下关闭 sink、向所属日志器发出警告并返回 `Ok(())`；
/// 严格策略下原样返回错误，sink 保持启用。
/// 配置错误及其他不可恢复的错误总是返回给调用方。
pub(crate) fn contain_failure<S: Sink>(
    sink: &mut S,
    policy: FailurePolicy,
    owner: &OwnerLink,
    err: FanlogError,
) -> Result<()> {
    diagnostics().increment_sink_errors();

    if !err.is_recoverable() || policy == FailurePolicy::Strict {
        return Err(err);
    }

    sink.close();
    diagnostics().increment_sinks_disabled();
    owner.warning(&format!("{} output disabled: {}", sink.kind(), err));
    Ok(())
}
