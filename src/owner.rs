//! 所属日志器的回调接口
//!
//! 路由器和各个 sink 只持有日志器的弱引用：日志器决定记录什么、何时记录，
//! 路由器只负责把结果分发出去，并在 sink 被自动关闭时通过 `warning` 回报。

use chrono::{DateTime, Local};
use std::fmt;
use std::sync::{Arc, Weak};

/// 拥有输出路由器的日志器。
pub trait LogOwner: Send + Sync {
    /// 日志器名称，用于文件名模板中的 `{owner}`
    fn name(&self) -> String;

    /// 应用名称，用于告警邮件标题
    fn app(&self) -> String {
        self.name()
    }

    /// 日志器启动时间，用于文件名模板中的 `{datetime}`
    fn start_date(&self) -> DateTime<Local>;

    /// 已渲染的日志头，告警邮件正文使用
    fn header(&self) -> String;

    /// sink 被自动关闭时的警告回调
    fn warning(&self, message: &str);
}

/// 指向所属日志器的弱引用。
///
/// 日志器不存在（从未绑定或已经被释放）时使用创建链接时记录的
/// 名称和启动时间。
#[derive(Clone)]
pub struct OwnerLink {
    owner: Option<Weak<dyn LogOwner>>,
    fallback_name: String,
    fallback_start: DateTime<Local>,
}

impl OwnerLink {
    /// 绑定到日志器
    pub fn new<O: LogOwner + 'static>(owner: &Arc<O>) -> Self {
        let weak = Arc::downgrade(owner);
        let weak: Weak<dyn LogOwner> = weak;
        Self {
            owner: Some(weak),
            fallback_name: owner.name(),
            fallback_start: owner.start_date(),
        }
    }

    /// 不绑定任何日志器
    pub fn detached() -> Self {
        Self {
            owner: None,
            fallback_name: process_name(),
            fallback_start: Local::now(),
        }
    }

    fn upgrade(&self) -> Option<Arc<dyn LogOwner>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_attached(&self) -> bool {
        self.upgrade().is_some()
    }

    pub fn name(&self) -> String {
        self.upgrade()
            .map(|owner| owner.name())
            .unwrap_or_else(|| self.fallback_name.clone())
    }

    pub fn app(&self) -> String {
        self.upgrade()
            .map(|owner| owner.app())
            .unwrap_or_else(|| self.fallback_name.clone())
    }

    pub fn start_date(&self) -> DateTime<Local> {
        self.upgrade()
            .map(|owner| owner.start_date())
            .unwrap_or(self.fallback_start)
    }

    pub fn header(&self) -> String {
        match self.upgrade() {
            Some(owner) => owner.header(),
            None => format!(
                "Application: {}\nHost: {}\nPID: {}\nStarted: {}\n",
                self.fallback_name,
                local_hostname(),
                std::process::id(),
                self.fallback_start.format("%Y-%m-%d %H:%M:%S"),
            ),
        }
    }

    /// 通过 tracing 以及日志器回调发出警告
    pub fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
        if let Some(owner) = self.upgrade() {
            owner.warning(message);
        }
    }
}

impl fmt::Debug for OwnerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerLink")
            .field("attached", &self.is_attached())
            .field("fallback_name", &self.fallback_name)
            .field("fallback_start", &self.fallback_start)
            .finish()
    }
}

impl Default for OwnerLink {
    fn default() -> Self {
        Self::detached()
    }
}

fn process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "fanlog".to_string())
}

/// 本机主机名，获取失败时返回 `localhost`
pub(crate) fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingOwner;
    use super::*;

    #[test]
    fn test_link_delegates_to_owner() {
        let owner = RecordingOwner::new("billing");
        let link = OwnerLink::new(&owner);

        assert!(link.is_attached());
        assert_eq!(link.name(), "billing");
        assert_eq!(link.app(), "billing-app");
        assert_eq!(link.start_date(), owner.started);
        assert_eq!(link.header(), "header of billing");

        link.warning("email output disabled");
        assert_eq!(owner.warnings(), vec!["email output disabled".to_string()]);
    }

    #[test]
    fn test_link_does_not_keep_owner_alive() {
        let owner = RecordingOwner::new("short-lived");
        let started = owner.started;
        let link = OwnerLink::new(&owner);
        drop(owner);

        assert!(!link.is_attached());
        assert_eq!(link.name(), "short-lived");
        assert_eq!(link.start_date(), started);
        // 日志器已释放，警告只进入 tracing
        link.warning("nobody listens");
    }

    #[test]
    fn test_detached_header_mentions_pid() {
        let link = OwnerLink::detached();
        assert!(!link.is_attached());
        assert!(link.header().contains(&std::process::id().to_string()));
    }
}
