//! fanlog Sinks 模块
//!
//! 提供各种日志输出目标的实现：控制台、文件、邮件、HTML 和数据库表。
//! 所有 sink 共用 [`traits::Output`] 定义的开关语义。

pub mod console;
pub mod email;
pub mod file;
pub mod html;
pub mod table;
pub mod traits;

// 重新导出主要类型
pub use console::ConsoleSink;
pub use email::{EmailMessage, EmailSink, TextPart};
pub use file::FileSink;
pub use html::HtmlSink;
pub use table::{
    fields, open_database, Database, FieldValue, FieldValues, MemoryDatabase, Session,
    TableOptions, TableProxy, TableSink,
};
pub use traits::{Output, Sink, SinkKind, SinkMetadata};

#[cfg(feature = "sqlite")]
pub use table::SqliteDatabase;
