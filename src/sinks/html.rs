//! HTML 输出 Sink
//!
//! 目前只保存目录和文件名，所有写入都是受开关保护的空操作，
//! 路由器可以无条件地调用它。

use crate::error::Result;
use crate::sinks::traits::{Output, Sink, SinkKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct HtmlSink {
    status: bool,
    directory: Option<PathBuf>,
    filename: Option<String>,
}

impl HtmlSink {
    pub fn new(enabled: bool) -> Self {
        Self {
            status: enabled,
            ..Default::default()
        }
    }

    pub fn configure(&mut self, directory: Option<&Path>, filename: Option<&str>) {
        if let Some(directory) = directory {
            self.directory = Some(directory.to_path_buf());
        }
        if let Some(filename) = filename {
            self.filename = Some(filename.to_string());
        }
    }

    pub fn write(&mut self, _text: &str) -> Result<()> {
        self.guarded(|_| Ok(()))
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

impl Output for HtmlSink {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
    }
}

impl Sink for HtmlSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_accepts_writes_in_both_states() {
        let mut sink = HtmlSink::new(false);
        assert!(sink.write("<p>x</p>").is_ok());
        sink.open();
        assert!(sink.write("<p>x</p>").is_ok());
    }

    #[test]
    fn test_html_configure_keeps_unspecified_fields() {
        let mut sink = HtmlSink::new(true);
        sink.configure(Some(Path::new("/tmp/report")), Some("index"));
        sink.configure(None, Some("summary"));

        assert_eq!(sink.directory(), Some(Path::new("/tmp/report")));
        assert_eq!(sink.filename(), Some("summary"));
    }
}
