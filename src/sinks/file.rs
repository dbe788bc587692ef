//! 单一文件 Sink
//!
//! 此模块实现写入单一文件的 sink。目录和文件名由模板生成，句柄在第一次写入时
//! 以追加模式打开，路径变化后失效。

use crate::config::{FileConfig, DEFAULT_EXTENSION, DEFAULT_FILENAME_TEMPLATE, DEFAULT_LOG_DIRECTORY};
use crate::diagnostics::diagnostics;
use crate::error::Result;
use crate::owner::OwnerLink;
use crate::sinks::traits::{Output, Sink, SinkKind};
use crate::utils::{render_template, FileTools, TemplateContext};

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 单一文件 Sink
#[derive(Debug)]
pub struct FileSink {
    status: bool,
    owner: OwnerLink,
    directory: PathBuf,
    /// 文件名模板
    filename: String,
    extension: String,
    /// 模板展开后的完整路径
    path: PathBuf,
    /// 最近一次成功写入后的修改时间
    modified: Option<DateTime<Local>>,
    /// 最近一次成功写入后的文件大小
    size: Option<u64>,
    handle: Option<File>,
}

impl FileSink {
    /// 创建新的文件 sink
    pub fn new(owner: OwnerLink, enabled: bool, config: &FileConfig) -> Self {
        let mut sink = Self {
            status: enabled,
            owner,
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            filename: DEFAULT_FILENAME_TEMPLATE.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            path: PathBuf::new(),
            modified: None,
            size: None,
            handle: None,
        };
        sink.path = sink.resolve_path();
        sink.configure(config);
        sink
    }

    /// 更新路径配置
    ///
    /// 只有实际发生变化的字段才会生效；任何字段变化都会重新计算路径，
    /// 丢弃已打开的句柄，并清空修改时间和大小。返回路径配置是否变化。
    pub fn configure(&mut self, config: &FileConfig) -> bool {
        let mut changed = false;

        if let Some(directory) = &config.directory {
            if *directory != self.directory {
                self.directory = directory.clone();
                changed = true;
            }
        }
        if let Some(filename) = &config.filename {
            if *filename != self.filename {
                self.filename = filename.clone();
                changed = true;
            }
        }
        if let Some(extension) = &config.extension {
            if *extension != self.extension {
                self.extension = extension.clone();
                changed = true;
            }
        }

        if changed {
            self.path = self.resolve_path();
            self.handle = None;
            self.modified = None;
            self.size = None;
            tracing::debug!("file output path set to {}", self.path.display());
        }

        changed
    }

    fn resolve_path(&self) -> PathBuf {
        let owner = self.owner.name();
        let context = TemplateContext {
            owner: &owner,
            datetime: self.owner.start_date(),
        };
        let mut basename = render_template(&self.filename, &context);

        let extension = self.extension.trim_start_matches('.');
        if !extension.is_empty() {
            basename.push('.');
            basename.push_str(extension);
        }

        // 目录同样可以含占位符，非 UTF-8 的目录原样使用
        let directory = match self.directory.to_str() {
            Some(directory) => PathBuf::from(render_template(directory, &context)),
            None => self.directory.clone(),
        };
        directory.join(basename)
    }

    /// 追加写入文本并立即刷新
    ///
    /// 目录创建、打开或写入失败时错误直接返回给调用方。
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.guarded(|sink| {
            let handle = match sink.handle.take() {
                Some(handle) => handle,
                None => {
                    tracing::debug!("opening log file {}", sink.path.display());
                    FileTools::open_file_append(&sink.path)?
                }
            };
            let handle = sink.handle.insert(handle);

            handle.write_all(text.as_bytes())?;
            handle.flush()?;

            sink.modified = Some(Local::now());
            sink.size = Some(FileTools::get_file_size(&sink.path)?);
            diagnostics().increment_file_writes();
            Ok(())
        })
    }

    /// 当前日志文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modified(&self) -> Option<DateTime<Local>> {
        self.modified
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// 句柄是否已打开
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}

impl Output for FileSink {
    fn status(&self) -> bool {
        self.status
    }

    fn set_status(&mut self, enabled: bool) {
        self.status = enabled;
    }
}

impl Sink for FileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::File
    }
}
