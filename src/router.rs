//! 输出路由器
//!
//! 路由器持有每种 sink 各一个实例。`write` 把同一条记录依次交给控制台、
//! 文件和 HTML；邮件与数据库表由所属日志器显式调用。

use crate::config::{FailurePolicy, OutputConfig};
use crate::error::Result;
use crate::owner::OwnerLink;
use crate::record::Render;
use crate::sinks::table::{FieldValues, TableOptions};
use crate::sinks::traits::{Output, Sink, SinkKind, SinkMetadata};
use crate::sinks::{ConsoleSink, EmailSink, FileSink, HtmlSink, TableSink};

/// 输出路由器
#[derive(Debug)]
pub struct OutputRouter {
    status: bool,
    owner: OwnerLink,
    policy: FailurePolicy,
    console: ConsoleSink,
    file: FileSink,
    email: EmailSink,
    html: HtmlSink,
    table: TableSink,
}

impl OutputRouter {
    /// 按配置构造所有 sink
    ///
    /// 邮件配置中给出连接参数时会立即连接；数据库表只在启用时配置。
    pub fn new(owner: OwnerLink, config: &OutputConfig) -> Result<Self> {
        let policy = config.failure_policy;

        let console = ConsoleSink::new(config.console);
        let file = FileSink::new(owner.clone(), config.file, &config.path);
        let email = EmailSink::new(owner.clone(), config.email, policy, &config.smtp)?;
        let html = HtmlSink::new(config.html);

        let mut table = TableSink::new(owner.clone(), config.table, policy);
        if config.table && (config.db.name.is_some() || config.db.has_connection()) {
            table.configure(TableOptions::new(config.db.clone()))?;
        }

        tracing::debug!(
            "output router for {} created, enabled={}",
            owner.name(),
            config.enabled
        );

        Ok(Self {
            status: config.enabled,
            owner,
            policy,
            console,
            file,
            email,
            html,
            table,
        })
    }

    /// 分发一条记录
    ///
    /// 顺序固定为控制台、文件、HTML，前一个 sink 出错时后面的不再执行，
    /// 已经完成的写入也不会回滚。
    pub fn write<R: Render + ?Sized>(&mut self, record: &R) -> Result<()> {
        self.guarded(|router| {
            let text = record.render();
            router.console.write(&text)?;
            router.file.write(&text)?;
            router.html.write(&text)?;
            Ok(())
        })
    }

    /// 发送告警邮件
    ///
    /// `with_log` 为真且文件 sink 启用时附带当前日志文件（文件已存在时）。
    pub fn alarm(&mut self, with_log: bool) -> Result<()> {
        self.guarded(|router| {
            let log_file = if with_log && router.file.status() && router.file.path().is_file() {
                Some(router.file.path().to_path_buf())
            } else {
                None
            };
            router.email.alarm(log_file.as_deref())
        })
    }

    /// 以字段形式写入数据库表
    pub fn write_fields(&mut self, values: FieldValues) -> Result<()> {
        self.guarded(|router| router.table.write(values))
    }

    /// 开始新的数据库表会话
    pub fn new_session(&mut self) -> Result<()> {
        self.guarded(|router| router.table.new_session())
    }

    pub fn owner(&self) -> &OwnerLink {
        &self.owner
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn console(&self) -> &ConsoleSink {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut ConsoleSink {
        &mut self.console
    }

    pub fn file(&self) -> &FileSink {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut FileSink {
        &mut self.file
    }

    pub fn email(&self) -> &EmailSink {
        &self.email
    }

    pub fn email_mut(&mut self) -> &mut EmailSink {
        &mut self.email
    }

    pub fn html(&self) -> &HtmlSink {
        &self.html
    }

    pub fn html_mut(&mut self) -> &mut HtmlSink {
        &mut self.html
    }

    pub fn table(&self) -> &TableSink {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableSink {
        &mut self.table
    }

    /// 所有 sink 的元数据，顺序固定
    pub fn sinks(&self) -> Vec<SinkMetadata> {
        vec![
            self.console.metadata(),
            self.file.metadata(),
            self.email.metadata(),
            self.html.metadata(),
            self.table.metadata(),
        ]
    }

    /// 当前启用的 sink
    pub fn enabled_sinks(&self) -> Vec<SinkKind> {
        self.sinks()
            .into_iter()
            .filter(|meta| meta.enabled)
            .map(|meta| meta.kind)
            .collect()
    }
}

impl Output for OutputRouter {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
    }
}
