//! 控制台输出 Sink 实现
//!
//! 将已渲染的文本原样写到标准输出，不追加换行。

use crate::diagnostics::diagnostics;
use crate::error::Result;
use crate::sinks::traits::{Output, Sink, SinkKind};

use std::fmt;
use std::io::{self, Write};

/// 控制台输出 Sink
///
/// 默认写到标准输出；测试或嵌入场景可以通过 [`ConsoleSink::with_writer`]
/// 替换目标。写入失败直接返回给调用方。
pub struct ConsoleSink {
    status: bool,
    writer: Option<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// 创建新的控制台 Sink
    pub fn new(enabled: bool) -> Self {
        Self {
            status: enabled,
            writer: None,
        }
    }

    /// 替换输出目标
    pub fn with_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// 替换输出目标（已构造的 sink）
    pub fn set_writer(&mut self, writer: Box<dyn Write + Send>) {
        self.writer = Some(writer);
    }

    /// 写出文本
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.guarded(|sink| {
            match sink.writer.as_mut() {
                Some(writer) => {
                    writer.write_all(text.as_bytes())?;
                    writer.flush()?;
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    handle.write_all(text.as_bytes())?;
                    handle.flush()?;
                }
            }
            diagnostics().increment_console_writes();
            Ok(())
        })
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("status", &self.status)
            .field("custom_writer", &self.writer.is_some())
            .finish()
    }
}

impl Output for ConsoleSink {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
    }
}

impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_writes_verbatim() {
        let buffer = SharedBuffer::default();
        let mut sink = ConsoleSink::new(true).with_writer(Box::new(buffer.clone()));

        sink.write("first").unwrap();
        sink.write(" second\n").unwrap();

        assert_eq!(buffer.contents(), "first second\n");
    }

    #[test]
    fn test_disabled_console_writes_nothing() {
        let buffer = SharedBuffer::default();
        let mut sink = ConsoleSink::new(false).with_writer(Box::new(buffer.clone()));

        sink.write("hidden\n").unwrap();
        assert_eq!(buffer.contents(), "");

        sink.open();
        sink.write("shown\n").unwrap();
        assert_eq!(buffer.contents(), "shown\n");
    }

    #[test]
    fn test_console_failure_propagates() {
        let mut sink = ConsoleSink::new(true).with_writer(Box::new(BrokenPipe));
        let result = sink.write("lost\n");
        assert!(matches!(result, Err(crate::error::FanlogError::IoError { .. })));
    }

    #[test]
    fn test_console_default_targets_stdout() {
        let mut sink = ConsoleSink::default();
        assert!(sink.status());
        assert_eq!(sink.kind(), SinkKind::Console);
        sink.write("").unwrap();
    }
}
