//! 文件路径模板
//!
//! 支持的占位符：
//!
//! - `{owner}`：所属日志器名称
//! - `{datetime}`：日志器启动时间，格式 `%Y%m%d%H%M%S`
//! - `{datetime:<format>}`：使用自定义 chrono 格式的启动时间
//!
//! `{{` 与 `}}` 输出字面量花括号，无法识别的占位符原样保留。

use chrono::{DateTime, Local};
use std::fmt::Write;

/// 默认的时间格式
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// 模板替换所需的值
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub owner: &'a str,
    pub datetime: DateTime<Local>,
}

/// 渲染模板
pub fn render(template: &str, context: &TemplateContext<'_>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            output.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            output.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            output.push('}');
            rest = &tail[1..];
            continue;
        }

        match tail.find('}') {
            Some(end) => {
                let placeholder = &tail[1..end];
                match substitute(placeholder, context) {
                    Some(value) => output.push_str(&value),
                    None => output.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                output.push_str(tail);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

fn substitute(placeholder: &str, context: &TemplateContext<'_>) -> Option<String> {
    let (key, format) = match placeholder.split_once(':') {
        Some((key, format)) => (key, Some(format)),
        None => (placeholder, None),
    };

    match key {
        "owner" => Some(context.owner.to_string()),
        "datetime" => {
            let format = format.unwrap_or(DEFAULT_DATETIME_FORMAT);
            let mut rendered = String::new();
            // chrono 在格式串非法时于 Display 中返回错误
            write!(rendered, "{}", context.datetime.format(format)).ok()?;
            Some(rendered)
        }
        _ => None,
    }
}
