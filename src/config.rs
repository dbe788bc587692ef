//! 定义 fanlog 输出路由器及各个 sink 的配置结构体。

use crate::error::{FanlogError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_db_pool_size() -> u32 {
    1
}
fn default_db_connection_timeout_ms() -> u64 {
    5000
}

/// 默认日志目录（相对于当前工作目录）
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
/// 默认文件名模板：日志器启动时间
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{datetime}";
/// 默认扩展名
pub const DEFAULT_EXTENSION: &str = "log";

/// 邮件或数据库表连接失败时的处理策略。
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 关闭出错的 sink 并通过所属日志器发出警告。
    #[default]
    Lenient,
    /// 把错误直接返回给调用方，sink 保持开启。
    Strict,
}

/// 输出路由器的顶层配置结构体。
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default = "default_true")]
    pub file: bool,
    #[serde(default = "default_false")]
    pub email: bool,
    #[serde(default = "default_false")]
    pub html: bool,
    #[serde(default = "default_false")]
    pub table: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub path: FileConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub db: TableConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            console: default_true(),
            file: default_true(),
            email: default_false(),
            html: default_false(),
            table: default_false(),
            failure_policy: FailurePolicy::default(),
            path: FileConfig::default(),
            smtp: SmtpConfig::default(),
            db: TableConfig::default(),
        }
    }
}

/// 文件输出的路径配置，未给出的字段保持原值。
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub directory: Option<PathBuf>,
    /// 文件名模板，支持 `{owner}`、`{datetime}` 和 `{datetime:<format>}` 占位符
    pub filename: Option<String>,
    pub extension: Option<String>,
}

impl FileConfig {
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }
}

/// 收件人：逗号分隔的字符串或者字符串列表。
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Recipients {
    Joined(String),
    List(Vec<String>),
}

impl Recipients {
    /// 规范化为地址列表：按逗号拆分、去掉两侧空白并丢弃空项。
    pub fn normalize(&self) -> Vec<String> {
        let split = |value: &str| -> Vec<String> {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        };

        match self {
            Recipients::Joined(value) => split(value),
            Recipients::List(items) => items.iter().flat_map(|item| split(item)).collect(),
        }
    }
}

impl From<&str> for Recipients {
    fn from(value: &str) -> Self {
        Recipients::Joined(value.to_string())
    }
}

impl From<Vec<String>> for Recipients {
    fn from(value: Vec<String>) -> Self {
        Recipients::List(value)
    }
}

/// SMTP 服务器与邮件参数，未给出的字段保持原值。
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// 发件人地址
    pub address: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub recipients: Option<Recipients>,
    /// 传输层超时（秒），连接、读、写共用；未设置时不设超时
    pub timeout_secs: Option<u64>,
}

impl SmtpConfig {
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn recipients(mut self, recipients: impl Into<Recipients>) -> Self {
        self.recipients = Some(recipients.into());
        self
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }
}

// 安全的Debug实现，避免泄露密码
impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("address", &self.address)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("recipients", &self.recipients)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 数据库表输出的配置：表名、日期列以及数据库连接参数。
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    pub name: Option<String>,
    pub date_column: Option<String>,
    /// 数据库类型，例如 `sqlite`
    pub vendor: Option<String>,
    /// 完整的连接串，优先于 vendor 等单独字段
    pub engine: Option<String>,
    pub path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub sid: Option<String>,
    pub service: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub pool_size: Option<u32>,
    pub connection_timeout_ms: Option<u64>,
}

impl TableConfig {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    pub fn sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.vendor = Some("sqlite".to_string());
        self.path = Some(path.into());
        self
    }

    /// 是否给出了足够建立数据库连接的参数
    pub fn has_connection(&self) -> bool {
        self.vendor.is_some() || self.engine.is_some()
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size.unwrap_or_else(default_db_pool_size)
    }

    pub fn connection_timeout_ms(&self) -> u64 {
        self.connection_timeout_ms
            .unwrap_or_else(default_db_connection_timeout_ms)
    }
}

// 安全的Debug实现，避免泄露敏感的连接参数
impl std::fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableConfig")
            .field("name", &self.name)
            .field("date_column", &self.date_column)
            .field("vendor", &self.vendor)
            .field("engine", &self.engine.as_ref().map(|_| "[REDACTED]"))
            .field("path", &self.path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sid", &self.sid)
            .field("service", &self.service)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("pool_size", &self.pool_size)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .finish()
    }
}

/// 用于从 TOML 文件加载 `OutputConfig` 的辅助函数。
pub fn load_config_from_file(path: &Path) -> Result<OutputConfig> {
    use std::fs;

    if !path.exists() {
        return Err(FanlogError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 用于从 TOML 字符串加载 `OutputConfig` 的辅助函数。
pub fn load_config_from_str(config_str: &str) -> Result<OutputConfig> {
    let config: OutputConfig = toml::from_str(config_str)
        .map_err(|e| FanlogError::ConfigError(format!("TOML解析失败: {}", e)))?;

    Ok(config)
}

/// 合并可选的配置文件与环境变量。
///
/// 环境变量使用 `<PREFIX>__<SECTION>__<KEY>` 形式，例如
/// `FANLOG__SMTP__PASSWORD`，这样密码等凭证不必写进配置文件。
pub fn load_config_layered(path: Option<&Path>, env_prefix: &str) -> Result<OutputConfig> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(FanlogError::ConfigFileMissing(
                path.to_string_lossy().into_owned(),
            ));
        }
        builder = builder.add_source(
            ::config::File::from(path)
                .format(::config::FileFormat::Toml)
                .required(true),
        );
    }

    builder = builder.add_source(
        ::config::Environment::with_prefix(env_prefix)
            .separator("__")
            .try_parsing(true),
    );

    let config: OutputConfig = builder.build()?.try_deserialize()?;
    Ok(config)
}

/// 验证配置的有效性。
pub fn validate_config(config: &OutputConfig) -> Result<()> {
    if config.email {
        let smtp = &config.smtp;
        match (&smtp.host, smtp.port) {
            (Some(_), None) => {
                return Err(FanlogError::config("SMTP 端口未设置: port is required with host"))
            }
            (None, Some(_)) => {
                return Err(FanlogError::config("SMTP 主机未设置: host is required with port"))
            }
            _ => {}
        }
        if smtp.user.is_some() && smtp.password.is_none() {
            return Err(FanlogError::config("can not login without a password"));
        }
    }

    if config.table {
        let db = &config.db;
        if db.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
            return Err(FanlogError::config("数据库表名不能为空"));
        }
        if !db.has_connection() {
            return Err(FanlogError::config(
                "数据库连接参数缺失: either vendor or engine must be set",
            ));
        }
    }

    if let Some(ref extension) = config.path.extension {
        if extension.contains(std::path::MAIN_SEPARATOR) {
            return Err(FanlogError::config(format!(
                "扩展名不能包含路径分隔符: {}",
                extension
            )));
        }
    }

    Ok(())
}
