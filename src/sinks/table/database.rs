//! 数据库抽象
//!
//! 表 sink 只依赖这里的两个 trait：`Database` 负责连通性检查和按表名查找，
//! `TableProxy` 负责单表的插入与更新。

use crate::error::Result;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

/// 单个字段的值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("NULL"),
            FieldValue::Bool(value) => write!(f, "{}", value),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Float(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// 按列名排列的一组字段值
pub type FieldValues = BTreeMap<String, FieldValue>;

/// 由 `(列名, 值)` 序列构造 [`FieldValues`]
pub fn fields<K, V, I>(pairs: I) -> FieldValues
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// 数据库连接
pub trait Database: Send + Sync + Debug {
    /// 取得一个连接后立即释放，用于连通性检查
    fn ping(&self) -> Result<()>;

    /// 按表名查找表，读取其结构
    fn table(&self, name: &str) -> Result<Arc<dyn TableProxy>>;
}

/// 单张表的句柄
pub trait TableProxy: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// 主键列名
    fn primary_key(&self) -> Vec<String>;

    /// 插入一行，返回该行的主键值
    fn insert(&self, values: &FieldValues) -> Result<FieldValue>;

    /// 按主键更新一行，返回受影响的行数
    fn update(&self, key_column: &str, key: &FieldValue, values: &FieldValues) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_field_value_conversions() {
        assert_eq!(FieldValue::from(3), FieldValue::Integer(3));
        assert_eq!(FieldValue::from("x"), FieldValue::Text("x".to_string()));
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some(true)), FieldValue::Bool(true));
    }

    #[test]
    fn test_fields_builder_and_display() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let values = fields([("a", FieldValue::from(1)), ("when", ts.into())]);

        assert_eq!(values.len(), 2);
        assert_eq!(values["a"].to_string(), "1");
        assert_eq!(values["when"].to_string(), "2024-01-02 03:04:05");
        assert_eq!(FieldValue::Null.to_string(), "NULL");
    }
}
