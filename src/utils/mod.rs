//! 实用工具模块
//!
//! 提供各种辅助功能和工具函数

pub mod file_tools;
pub mod template;

pub use file_tools::FileTools;
pub use template::{render as render_template, TemplateContext};
