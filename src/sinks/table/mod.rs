//! 数据库表输出 Sink
//!
//! 一次日志会话内第一次写入插入一行并记录主键，之后的写入都按该主键
//! 更新同一行；`new()` 开始新的会话，下一次写入重新插入。

pub mod database;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use database::{fields, Database, FieldValue, FieldValues, TableProxy};
pub use memory::MemoryDatabase;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

use crate::config::{FailurePolicy, TableConfig};
use crate::diagnostics::diagnostics;
use crate::error::{FanlogError, Result};
use crate::owner::OwnerLink;
use crate::sinks::traits::{contain_failure, Output, Sink, SinkKind};

use chrono::Local;
use std::fmt;
use std::sync::Arc;

/// 会话状态
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    /// 本次会话尚未插入
    #[default]
    Fresh,
    /// 已插入，后续写入按该主键更新
    Bound(FieldValue),
}

/// 表 sink 的配置参数
///
/// 除了 [`TableConfig`] 中的字段外，还可以直接给出已经构造好的数据库
/// 或表句柄。
#[derive(Clone, Default)]
pub struct TableOptions {
    pub config: TableConfig,
    pub database: Option<Arc<dyn Database>>,
    pub proxy: Option<Arc<dyn TableProxy>>,
}

impl TableOptions {
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            database: None,
            proxy: None,
        }
    }

    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn proxy(mut self, proxy: Arc<dyn TableProxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

impl fmt::Debug for TableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableOptions")
            .field("config", &self.config)
            .field("database", &self.database.is_some())
            .field("proxy", &self.proxy.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}

impl From<TableConfig> for TableOptions {
    fn from(config: TableConfig) -> Self {
        TableOptions::new(config)
    }
}

/// 按 [`TableConfig`] 构造数据库
///
/// 支持 `engine` 连接串，或 `vendor = "sqlite"` 加 `path`（未给出时为
/// `:memory:`）。其他数据库类型在当前构建中是配置错误。
pub fn open_database(config: &TableConfig) -> Result<Arc<dyn Database>> {
    let vendor = config.vendor.as_deref().map(str::to_ascii_lowercase);

    let url = match (&config.engine, vendor.as_deref()) {
        (Some(engine), _) => match engine.strip_prefix("sqlite://") {
            Some(path) => path.to_string(),
            None if vendor.as_deref().map_or(true, |v| v == "sqlite") => engine.clone(),
            None => {
                return Err(FanlogError::config(format!(
                    "unsupported database engine: {}",
                    engine
                )))
            }
        },
        (None, Some("sqlite")) => config
            .path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ":memory:".to_string()),
        (None, Some(other)) => {
            return Err(FanlogError::config(format!(
                "unsupported database vendor: {}",
                other
            )))
        }
        (None, None) => {
            return Err(FanlogError::config(
                "数据库连接参数缺失: either vendor or engine must be set",
            ))
        }
    };

    open_sqlite(&url, config)
}

#[cfg(feature = "sqlite")]
fn open_sqlite(url: &str, config: &TableConfig) -> Result<Arc<dyn Database>> {
    let database = SqliteDatabase::open(url, config.pool_size(), config.connection_timeout_ms())?;
    Ok(Arc::new(database))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_url: &str, _config: &TableConfig) -> Result<Arc<dyn Database>> {
    Err(FanlogError::config(
        "SQLite support not enabled: rebuild fanlog with the `sqlite` feature",
    ))
}

/// 数据库表输出 Sink
pub struct TableSink {
    status: bool,
    owner: OwnerLink,
    policy: FailurePolicy,
    name: Option<String>,
    database: Option<Arc<dyn Database>>,
    proxy: Option<Arc<dyn TableProxy>>,
    date_column: Option<String>,
    primary_key_column: Option<String>,
    session: Session,
    /// 因连接失败被自动关闭，下一次成功的配置会重新启用
    suspended: bool,
}

impl TableSink {
    /// 创建未配置的表 sink
    ///
    /// 在调用 [`TableSink::configure`] 之前写入会返回配置错误。
    pub fn new(owner: OwnerLink, enabled: bool, policy: FailurePolicy) -> Self {
        Self {
            status: enabled,
            owner,
            policy,
            name: None,
            database: None,
            proxy: None,
            date_column: None,
            primary_key_column: None,
            session: Session::Fresh,
            suspended: false,
        }
    }

    /// 配置表
    ///
    /// 给出的数据库替换当前数据库；否则仅在尚无数据库时按连接参数构造。
    /// 数据库连通性检查失败按失败策略处理。表句柄可以直接给出（采用其
    /// 表名），也可以按表名经数据库查找。主键必须恰好一列，否则清空表句柄
    /// 并返回配置错误。成功后会话回到 `Fresh`，之前因连接失败被关闭的
    /// sink 重新启用。表不存在等非连接错误直接返回。
    pub fn configure(&mut self, options: TableOptions) -> Result<()> {
        let TableOptions {
            config,
            database,
            proxy,
        } = options;

        if let Some(name) = &config.name {
            if name.trim().is_empty() {
                return Err(FanlogError::config("数据库表名不能为空"));
            }
            self.name = Some(name.clone());
        }

        match database {
            Some(database) => self.database = Some(database),
            None if self.database.is_none() && config.has_connection() => {
                self.database = Some(open_database(&config)?);
            }
            None => {}
        }

        if let Some(database) = self.database.clone() {
            if let Err(err) = database.ping() {
                return self.contain(err);
            }
            tracing::debug!("database for table output is reachable");
        }

        let proxy = match proxy {
            Some(proxy) => {
                self.name = Some(proxy.name().to_string());
                proxy
            }
            None => {
                let name = self
                    .name
                    .clone()
                    .ok_or_else(|| FanlogError::config("table name is not set"))?;
                let database = self.database.clone().ok_or_else(|| {
                    FanlogError::config("a database is required to look up a table by name")
                })?;
                match database.table(&name) {
                    Ok(proxy) => proxy,
                    Err(err) if err.is_recoverable() => return self.contain(err),
                    Err(err) => return Err(err),
                }
            }
        };

        if let Some(column) = &config.date_column {
            self.date_column = Some(column.clone());
        }

        let mut keys = proxy.primary_key();
        if keys.len() != 1 {
            self.proxy = None;
            self.primary_key_column = None;
            self.session = Session::Fresh;
            return Err(FanlogError::config(format!(
                "primary key number should be 1 not {}",
                keys.len()
            )));
        }

        self.primary_key_column = keys.pop();
        self.proxy = Some(proxy);
        self.session = Session::Fresh;
        if self.suspended {
            tracing::info!("table output re-enabled after reconfiguration");
            self.open();
        }
        tracing::debug!(
            "table output bound to {:?} keyed by {:?}",
            self.name,
            self.primary_key_column
        );
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

    /// 开始新的日志会话，下一次写入将插入新行
    pub fn new_session(&mut self) -> Result<()> {
        self.guarded(|sink| {
            sink.session = Session::Fresh;
            Ok(())
        })
    }

    /// 写入一组字段
    ///
    /// 会话为 `Fresh` 时插入并记录主键，为 `Bound` 时按主键更新。
    /// 配置了日期列时总是写入当前时间，覆盖调用方给出的值。
    pub fn write(&mut self, mut values: FieldValues) -> Result<()> {
        self.guarded(|sink| {
            let (proxy, key_column) = match (&sink.proxy, &sink.primary_key_column) {
                (Some(proxy), Some(column)) => (proxy.clone(), column.clone()),
                _ => return Err(FanlogError::config("table output is not configured")),
            };

            if let Some(column) = &sink.date_column {
                values.insert(
                    column.clone(),
                    FieldValue::Timestamp(Local::now().naive_local()),
                );
            }

            match sink.session.clone() {
                Session::Fresh => {
                    let key = proxy.insert(&values)?;
                    diagnostics().increment_table_inserts();
                    tracing::debug!("inserted row {} into {}", key, proxy.name());
                    sink.session = Session::Bound(key);
                }
                Session::Bound(key) => {
                    let affected = proxy.update(&key_column, &key, &values)?;
                    diagnostics().increment_table_updates();
                    if affected == 0 {
                        tracing::warn!("row {} of {} no longer exists", key, proxy.name());
                    }
                }
            }
            Ok(())
        })
    }

    /// 当前会话已绑定的主键
    pub fn primary_key(&self) -> Option<&FieldValue> {
        match &self.session {
            Session::Fresh => None,
            Session::Bound(key) => Some(key),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn date_column(&self) -> Option<&str> {
        self.date_column.as_deref()
    }

    pub fn primary_key_column(&self) -> Option<&str> {
        self.primary_key_column.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.proxy.is_some()
    }
}

impl fmt::Debug for TableSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSink")
            .field("status", &self.status)
            .field("policy", &self.policy)
            .field("name", &self.name)
            .field("database", &self.database)
            .field("date_column", &self.date_column)
            .field("primary_key_column", &self.primary_key_column)
            .field("session", &self.session)
            .field("suspended", &self.suspended)
            .finish()
    }
}

impl Output for TableSink {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
        self.suspended = false;
    }
}

impl Sink for TableSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Table
    }
}
