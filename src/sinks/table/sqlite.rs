//! SQLite 数据库后端
//!
//! 使用 diesel 的 r2d2 连接池，每次插入或更新时取得连接，用完立即归还。
//! 表结构通过 `pragma_table_info` 读取。

use super::database::{Database, FieldValue, FieldValues, TableProxy};
use crate::error::{FanlogError, Result};

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::query_builder::BoxedSqlQuery;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_types::{BigInt, Bool, Double, Integer, Nullable, Text, Timestamp};
use diesel::sqlite::{Sqlite, SqliteConnection};
use std::sync::Arc;
use std::time::Duration;

/// 数据库连接池类型别名
type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(QueryableByName, Debug)]
struct ColumnInfo {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    column_type: String,
    #[diesel(sql_type = Integer)]
    pk: i32,
}

#[derive(QueryableByName, Debug)]
struct KeyValue {
    #[diesel(sql_type = Nullable<Text>)]
    value: Option<String>,
}

/// SQLite 数据库
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("url", &self.url)
            .field("pool", &"<SqlitePool>")
            .finish()
    }
}

impl SqliteDatabase {
    /// 创建连接池，不立即建立连接
    ///
    /// `:memory:` 数据库的每个连接互相独立，此时应使用大小为 1 的连接池。
    pub fn open(url: &str, pool_size: u32, connection_timeout_ms: u64) -> Result<Self> {
        if pool_size == 0 {
            return Err(FanlogError::config("数据库连接池大小必须大于 0"));
        }

        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_millis(connection_timeout_ms))
            .build_unchecked(manager);

        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    fn connection(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(|e| {
            FanlogError::database_connection(format!("获取 SQLite 连接失败: {}", e))
        })
    }

    /// 执行任意 SQL 脚本，例如建表语句
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let mut conn = self.connection()?;
        conn.batch_execute(sql)
            .map_err(|e| FanlogError::database(format!("SQLite 脚本执行失败: {}", e)))
    }
}

impl Database for SqliteDatabase {
    fn ping(&self) -> Result<()> {
        self.connection().map(|_| ())
    }

    fn table(&self, name: &str) -> Result<Arc<dyn TableProxy>> {
        let mut conn = self.connection()?;
        let columns = diesel::sql_query(
            "SELECT name, type AS column_type, pk FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind::<Text, _>(name)
        .load::<ColumnInfo>(&mut *conn)
        .map_err(|e| FanlogError::database(format!("读取表结构失败: {}", e)))?;

        if columns.is_empty() {
            return Err(FanlogError::database(format!("no such table: {}", name)));
        }

        let mut keyed: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk > 0).collect();
        keyed.sort_by_key(|c| c.pk);

        Ok(Arc::new(SqliteTable {
            pool: self.pool.clone(),
            name: name.to_string(),
            primary_key: keyed
                .iter()
                .map(|c| (c.name.clone(), c.column_type.to_ascii_uppercase()))
                .collect(),
        }))
    }
}

/// SQLite 中一张表的句柄
pub struct SqliteTable {
    pool: SqlitePool,
    name: String,
    /// 主键列及其声明类型
    primary_key: Vec<(String, String)>,
}

impl std::fmt::Debug for SqliteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTable")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .finish()
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn bind_value<'f>(
    query: BoxedSqlQuery<'f, Sqlite, diesel::query_builder::SqlQuery>,
    value: &FieldValue,
) -> BoxedSqlQuery<'f, Sqlite, diesel::query_builder::SqlQuery> {
    match value {
        FieldValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        FieldValue::Bool(v) => query.bind::<Bool, _>(*v),
        FieldValue::Integer(v) => query.bind::<BigInt, _>(*v),
        FieldValue::Float(v) => query.bind::<Double, _>(*v),
        FieldValue::Text(v) => query.bind::<Text, _>(v.clone()),
        FieldValue::Timestamp(v) => query.bind::<Timestamp, _>(*v),
    }
}

impl SqliteTable {
    fn connection(&self) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(|e| {
            FanlogError::database_connection(format!("获取 SQLite 连接失败: {}", e))
        })
    }
}

impl TableProxy for SqliteTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> Vec<String> {
        self.primary_key.iter().map(|(name, _)| name.clone()).collect()
    }

    fn insert(&self, values: &FieldValues) -> Result<FieldValue> {
        let table = quote(&self.name);
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns: Vec<String> = values.keys().map(|c| quote(c)).collect();
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            )
        };

        let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
        for value in values.values() {
            query = bind_value(query, value);
        }

        // 插入与读取主键必须使用同一个连接
        let mut conn = self.connection()?;
        query
            .execute(&mut *conn)
            .map_err(|e| FanlogError::database(format!("SQLite 插入失败: {}", e)))?;

        let (key_column, key_type) = match self.primary_key.first() {
            Some(key) => key,
            None => return Ok(FieldValue::Null),
        };
        if let Some(value) = values.get(key_column) {
            if *value != FieldValue::Null {
                return Ok(value.clone());
            }
        }

        let key = diesel::sql_query(format!(
            "SELECT CAST({} AS TEXT) AS value FROM {} WHERE rowid = last_insert_rowid()",
            quote(key_column),
            table
        ))
        .get_result::<KeyValue>(&mut *conn)
        .map_err(|e| FanlogError::database(format!("读取插入主键失败: {}", e)))?;

        Ok(match key.value {
            None => FieldValue::Null,
            Some(text) if key_type.contains("INT") => text
                .parse::<i64>()
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Text(text)),
            Some(text) => FieldValue::Text(text),
        })
    }

    fn update(&self, key_column: &str, key: &FieldValue, values: &FieldValues) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = values.keys().map(|c| format!("{} = ?", quote(c))).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(&self.name),
            assignments.join(", "),
            quote(key_column)
        );

        let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
        for value in values.values() {
            query = bind_value(query, value);
        }
        query = bind_value(query, key);

        let mut conn = self.connection()?;
        let affected = query
            .execute(&mut *conn)
            .map_err(|e| FanlogError::database(format!("SQLite 更新失败: {}", e)))?;
        Ok(affected as u64)
    }
}
