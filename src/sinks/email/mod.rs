//! 邮件输出 Sink
//!
//! 邮件不参与路由器的无条件分发，由所属日志器在出错或告警时显式调用。
//! 连接或登录失败按 [`FailurePolicy`] 处理：宽松策略下关闭 sink 并警告，
//! 配置错误总是返回给调用方。

pub mod mime;
pub mod smtp;

pub use mime::{Attachment, TextPart};
pub use smtp::SmtpSession;

use crate::config::{FailurePolicy, Recipients, SmtpConfig};
use crate::diagnostics::diagnostics;
use crate::error::{FanlogError, Result};
use crate::owner::{local_hostname, OwnerLink};
use crate::sinks::traits::{contain_failure, Output, Sink, SinkKind};
use crate::utils::FileTools;
use mime::{escape_html, MimeMessage};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认的文本子类型
pub const DEFAULT_SUBTYPE: &str = "html";

/// 一封待发送的邮件
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub subject: String,
    pub parts: Vec<TextPart>,
    /// 覆盖配置中的默认收件人
    pub recipients: Option<Recipients>,
    pub attachments: Vec<PathBuf>,
    /// 未显式指定子类型的文本部分使用的子类型
    pub subtype: String,
}

impl EmailMessage {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            parts: Vec::new(),
            recipients: None,
            attachments: Vec::new(),
            subtype: DEFAULT_SUBTYPE.to_string(),
        }
    }

    pub fn text(mut self, part: impl Into<TextPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn recipients(mut self, recipients: impl Into<Recipients>) -> Self {
        self.recipients = Some(recipients.into());
        self
    }

    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    pub fn content_type(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = subtype.into();
        self
    }
}

impl Default for EmailMessage {
    fn default() -> Self {
        Self::new("")
    }
}

/// 邮件输出 Sink
pub struct EmailSink {
    status: bool,
    owner: OwnerLink,
    policy: FailurePolicy,
    /// 发件人地址
    address: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    tls: bool,
    user: Option<String>,
    password: Option<String>,
    recipients: Vec<String>,
    timeout: Option<Duration>,
    session: Option<SmtpSession>,
    /// 因连接失败被自动关闭，下一次成功的配置会重新启用
    suspended: bool,
}

impl EmailSink {
    /// 创建邮件 sink 并应用配置
    ///
    /// 配置中给出了连接参数时会立即尝试连接。
    pub fn new(
        owner: OwnerLink,
        enabled: bool,
        policy: FailurePolicy,
        config: &SmtpConfig,
    ) -> Result<Self> {
        let mut sink = Self {
            status: enabled,
            owner,
            policy,
            address: None,
            host: None,
            port: None,
            tls: false,
            user: None,
            password: None,
            recipients: Vec::new(),
            timeout: config.timeout(),
            session: None,
            suspended: false,
        };
        sink.configure(config)?;
        Ok(sink)
    }

    /// 更新配置
    ///
    /// 只保存给出的字段。host、port、user 或 password 实际变化时重新连接，
    /// 连接失败按失败策略处理；缺少必需参数的配置错误直接返回。
    /// 之前因连接失败被关闭的 sink 总是重新连接，成功后重新启用。
    pub fn configure(&mut self, config: &SmtpConfig) -> Result<()> {
        let mut reconnect = false;

        if let Some(address) = &config.address {
            self.address = Some(address.clone());
        }
        if let Some(tls) = config.tls {
            self.tls = tls;
        }
        if let Some(recipients) = &config.recipients {
            self.recipients = recipients.normalize();
        }
        if let Some(secs) = config.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }

        if config.host.is_some() && config.host != self.host {
            self.host = config.host.clone();
            reconnect = true;
        }
        if config.port.is_some() && config.port != self.port {
            self.port = config.port;
            reconnect = true;
        }
        if config.user.is_some() && config.user != self.user {
            self.user = config.user.clone();
            reconnect = true;
        }
        if config.password.is_some() && config.password != self.password {
            self.password = config.password.clone();
            reconnect = true;
        }

        if self.suspended {
            match self.establish(None) {
                Ok(()) => {
                    tracing::info!("email output re-enabled after reconfiguration");
                    self.open();
                }
                Err(err) => self.contain(err)?,
            }
        } else if reconnect {
            if let Err(err) = self.connect(None) {
                self.contain(err)?;
            }
        }
        Ok(())
    }

    fn contain(&mut self, err: FanlogError) -> Result<()> {
        let was_live = self.status || self.suspended;
        let owner = self.owner.clone();
        let policy = self.policy;
        contain_failure(self, policy, &owner, err)?;
        self.suspended = was_live;
        Ok(())
    }

    /// 建立 SMTP 会话
    ///
    /// `password` 为 `None` 时使用已保存的密码。host 和 port 必须已设置，
    /// 设置了 user 时必须有密码，这些检查都在打开套接字之前完成。
    pub fn connect(&mut self, password: Option<&str>) -> Result<()> {
        self.guarded(|sink| sink.establish(password))
    }

    fn establish(&mut self, password: Option<&str>) -> Result<()> {
        let host = self
            .host
            .clone()
            .ok_or_else(|| FanlogError::config("SMTP host is not set"))?;
        let port = self
            .port
            .ok_or_else(|| FanlogError::config("SMTP port is not set"))?;
        if self.tls && !cfg!(feature = "tls") {
            return Err(FanlogError::config(
                "SMTP TLS requested but fanlog was built without the `tls` feature",
            ));
        }

        if let Some(password) = password {
            self.password = Some(password.to_string());
        }
        let credentials = match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            (Some(_), None) => return Err(FanlogError::config("can not login without a password")),
            (None, _) => None,
        };

        self.drop_session();

        let mut session = SmtpSession::connect(&host, port, self.timeout)?;
        if self.tls {
            session = session.starttls(&host)?;
        }
        if let Some((user, password)) = credentials {
            session.login(&user, &password)?;
        }

        tracing::info!("SMTP session established with {}:{}", host, port);
        self.session = Some(session);
        Ok(())
    }

    /// 结束当前会话
    pub fn disconnect(&mut self) -> Result<()> {
        self.guarded(|sink| {
            sink.drop_session();
            Ok(())
        })
    }

    fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.quit() {
                tracing::debug!("SMTP QUIT failed: {}", e);
            }
        }
    }

    /// 发送邮件
    ///
    /// 没有可用收件人时不进行任何网络操作。附件读取失败直接返回，
    /// 会话缺失或投递失败按失败策略处理。
    pub fn send(&mut self, message: EmailMessage) -> Result<()> {
        self.guarded(|sink| {
            let recipients = match &message.recipients {
                Some(recipients) => recipients.normalize(),
                None => sink.recipients.clone(),
            };
            if recipients.is_empty() {
                tracing::debug!("email '{}' has no recipients, skipped", message.subject);
                return Ok(());
            }

            let mut attachments = Vec::with_capacity(message.attachments.len());
            for path in &message.attachments {
                attachments.push(Attachment {
                    filename: FileTools::basename(path),
                    data: FileTools::read_file(path)?,
                });
            }

            let from = sink.sender();
            let data = MimeMessage {
                from: &from,
                to: &recipients,
                subject: &message.subject,
                default_subtype: &message.subtype,
                parts: &message.parts,
                attachments: &attachments,
            }
            .render();

            let result = match sink.session.as_mut() {
                Some(session) => session.send_mail(Some(&from), &recipients, &data),
                None => Err(FanlogError::smtp("no SMTP session")),
            };

            match result {
                Ok(()) => {
                    diagnostics().increment_emails_sent();
                    tracing::debug!("email '{}' sent to {}", message.subject, recipients.join(", "));
                    Ok(())
                }
                Err(err) => sink.contain(err),
            }
        })
    }

    /// 发送告警邮件，正文为日志头，可附带日志文件
    pub fn alarm(&mut self, log_file: Option<&Path>) -> Result<()> {
        let mut message = EmailMessage::new(format!("ALARM in {}!", self.owner.app()))
            .text(format!("<pre>{}</pre>", escape_html(&self.owner.header())));
        if let Some(path) = log_file {
            message = message.attach(path);
        }
        self.send(message)
    }

    fn sender(&self) -> String {
        self.address
            .clone()
            .or_else(|| self.user.clone())
            .unwrap_or_else(|| format!("{}@{}", self.owner.name(), local_hostname()))
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// 规范化后的默认收件人
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }
}

impl fmt::Debug for EmailSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSink")
            .field("status", &self.status)
            .field("policy", &self.policy)
            .field("address", &self.address)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("recipients", &self.recipients)
            .field("session", &self.session)
            .field("suspended", &self.suspended)
            .finish()
    }
}

impl Output for EmailSink {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
        self.suspended = false;
    }
}

impl Sink for EmailSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Email
    }
}
