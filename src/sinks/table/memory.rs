//! 进程内数据库
//!
//! 不依赖任何外部服务，整数主键自增。适合测试以及只需要在内存中
//! 关联日志行的嵌入场景。

use super::database::{Database, FieldValue, FieldValues, TableProxy};
use crate::error::{FanlogError, Result};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryTable {
    primary_key: Vec<String>,
    rows: Vec<FieldValues>,
    next_id: i64,
}

#[derive(Debug)]
struct MemoryState {
    reachable: bool,
    tables: BTreeMap<String, MemoryTable>,
}

/// 进程内数据库，克隆后共享同一份数据
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                reachable: true,
                tables: BTreeMap::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| FanlogError::internal("memory database lock poisoned"))
    }

    /// 创建（或替换）一张表
    pub fn create_table(&self, name: &str, primary_key: &[&str]) -> Result<()> {
        let mut state = self.lock()?;
        state.tables.insert(
            name.to_string(),
            MemoryTable {
                primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
        Ok(())
    }

    /// 模拟数据库宕机或恢复
    pub fn set_reachable(&self, reachable: bool) -> Result<()> {
        self.lock()?.reachable = reachable;
        Ok(())
    }

    /// 表中所有行的副本
    pub fn rows(&self, table: &str) -> Result<Vec<FieldValues>> {
        let state = self.lock()?;
        state
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| FanlogError::database(format!("no such table: {}", table)))
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDatabase {
    fn ping(&self) -> Result<()> {
        if self.lock()?.reachable {
            Ok(())
        } else {
            Err(FanlogError::database_connection("memory database is unreachable"))
        }
    }

    fn table(&self, name: &str) -> Result<Arc<dyn TableProxy>> {
        let state = self.lock()?;
        if !state.reachable {
            return Err(FanlogError::database_connection("memory database is unreachable"));
        }
        let table = state
            .tables
            .get(name)
            .ok_or_else(|| FanlogError::database(format!("no such table: {}", name)))?;

        Ok(Arc::new(MemoryTableProxy {
            database: self.clone(),
            name: name.to_string(),
            primary_key: table.primary_key.clone(),
        }))
    }
}

/// [`MemoryDatabase`] 中一张表的句柄
#[derive(Debug)]
pub struct MemoryTableProxy {
    database: MemoryDatabase,
    name: String,
    primary_key: Vec<String>,
}

impl MemoryTableProxy {
    fn with_table<R>(&self, op: impl FnOnce(&mut MemoryTable) -> Result<R>) -> Result<R> {
        let mut state = self.database.lock()?;
        if !state.reachable {
            return Err(FanlogError::database_connection("memory database is unreachable"));
        }
        let table = state
            .tables
            .get_mut(&self.name)
            .ok_or_else(|| FanlogError::database(format!("no such table: {}", self.name)))?;
        op(table)
    }
}

impl TableProxy for MemoryTableProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> Vec<String> {
        self.primary_key.clone()
    }

    fn insert(&self, values: &FieldValues) -> Result<FieldValue> {
        let key_column = self.primary_key.first().cloned();
        self.with_table(|table| {
            let mut row = values.clone();
            let key = match &key_column {
                Some(column) => match row.get(column) {
                    Some(value) if *value != FieldValue::Null => value.clone(),
                    _ => {
                        let id = FieldValue::Integer(table.next_id);
                        table.next_id += 1;
                        row.insert(column.clone(), id.clone());
                        id
                    }
                },
                None => FieldValue::Null,
            };
            table.rows.push(row);
            Ok(key)
        })
    }

    fn update(&self, key_column: &str, key: &FieldValue, values: &FieldValues) -> Result<u64> {
        self.with_table(|table| {
            let mut affected = 0;
            for row in table
                .rows
                .iter_mut()
                .filter(|row| row.get(key_column) == Some(key))
            {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
            Ok(affected)
        })
    }
}
