//! MIME 邮件组装
//!
//! 生成 `multipart/mixed` 邮件：文本部分与附件都使用 base64 编码，
//! 行尾统一为 CRLF。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// base64 正文每行的最大长度
const LINE_WIDTH: usize = 76;

/// 邮件的文本部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    /// `text/<subtype>` 中的子类型，`None` 时使用邮件的默认子类型
    pub subtype: Option<String>,
    pub content: String,
}

impl TextPart {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            subtype: None,
            content: content.into(),
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self::with_subtype("plain", content)
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::with_subtype("html", content)
    }

    pub fn with_subtype(subtype: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subtype: Some(subtype.into()),
            content: content.into(),
        }
    }
}

impl From<&str> for TextPart {
    fn from(content: &str) -> Self {
        TextPart::new(content)
    }
}

impl From<String> for TextPart {
    fn from(content: String) -> Self {
        TextPart::new(content)
    }
}

/// 已读入内存的附件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// 待发送的完整邮件
#[derive(Debug, Clone)]
pub struct MimeMessage<'a> {
    pub from: &'a str,
    pub to: &'a [String],
    pub subject: &'a str,
    pub default_subtype: &'a str,
    pub parts: &'a [TextPart],
    pub attachments: &'a [Attachment],
}

impl MimeMessage<'_> {
    /// 使用随机分隔符生成邮件正文
    pub fn render(&self) -> String {
        self.render_with_boundary(&new_boundary())
    }

    /// 使用指定分隔符生成邮件正文
    pub fn render_with_boundary(&self, boundary: &str) -> String {
        let mut out = String::new();

        // 写入 String 不会失败
        let _ = write!(out, "From: {}\r\n", single_line(self.from));
        let _ = write!(out, "To: {}\r\n", single_line(&self.to.join(", ")));
        let _ = write!(out, "Subject: {}\r\n", encode_header(self.subject));
        let _ = write!(out, "Date: {}\r\n", Local::now().to_rfc2822());
        out.push_str("MIME-Version: 1.0\r\n");
        let _ = write!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
            boundary
        );

        for part in self.parts {
            let subtype = part.subtype.as_deref().unwrap_or(self.default_subtype);
            let _ = write!(out, "--{}\r\n", boundary);
            let _ = write!(
                out,
                "Content-Type: text/{}; charset=\"utf-8\"\r\n",
                subtype
            );
            out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            out.push_str(&wrap_base64(part.content.as_bytes()));
        }

        for attachment in self.attachments {
            let _ = write!(out, "--{}\r\n", boundary);
            out.push_str("Content-Type: application/octet-stream\r\n");
            out.push_str("Content-Transfer-Encoding: base64\r\n");
            let _ = write!(
                out,
                "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
                attachment.filename.replace('"', "")
            );
            out.push_str(&wrap_base64(&attachment.data));
        }

        let _ = write!(out, "--{}--\r\n", boundary);
        out
    }
}

/// 非 ASCII 标题使用 RFC 2047 编码，换行被替换为空格
pub fn encode_header(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        value
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// base64 编码并按 76 列折行，每行以 CRLF 结尾
pub fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 2);

    // base64 输出只含 ASCII，按字节切分安全
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// HTML 转义，用于把日志头放进 `<pre>` 块
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn new_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("=_fanlog_{:x}_{:x}", std::process::id(), nanos)
}
