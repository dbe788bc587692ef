//! 文件工具模块
//!
//! 提供文件 sink 与邮件附件用到的文件操作工具函数。

use crate::error::{FanlogError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// 文件工具结构体
///
/// 提供各种文件操作的静态方法
pub struct FileTools;

impl FileTools {
    /// 确保目录存在，如果不存在则递归创建
    ///
    /// # 参数
    ///
    /// * `path` - 目录路径
    ///
    /// # 返回值
    ///
    /// 成功时返回 `Ok(())`，路径存在但不是目录或创建失败时返回错误
    pub fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();

        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| FanlogError::IoError {
                source: std::io::Error::new(
                    e.kind(),
                    format!("创建目录失败: {}: {}", path.display(), e),
                ),
            })?
        } else if !path.is_dir() {
            return Err(FanlogError::IoError {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("路径存在但不是目录: {}", path.display()),
                ),
            });
        }

        Ok(())
    }

    /// 以追加模式打开文件，必要时创建文件及其父目录
    pub fn open_file_append<P: AsRef<Path>>(file_path: P) -> Result<File> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_directory_exists(parent)?;
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .map_err(|e| FanlogError::IoError {
                source: std::io::Error::new(
                    e.kind(),
                    format!("打开文件失败: {}: {}", file_path.display(), e),
                ),
            })
    }

    /// 获取文件大小（字节）
    pub fn get_file_size<P: AsRef<Path>>(file_path: P) -> Result<u64> {
        let metadata = fs::metadata(file_path.as_ref())?;
        Ok(metadata.len())
    }

    /// 读取整个文件，用于邮件附件
    pub fn read_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<u8>> {
        let file_path = file_path.as_ref();

        fs::read(file_path).map_err(|e| FanlogError::IoError {
            source: std::io::Error::new(
                e.kind(),
                format!("读取文件失败: {}: {}", file_path.display(), e),
            ),
        })
    }

    /// 获取路径的文件名部分
    pub fn basename<P: AsRef<Path>>(file_path: P) -> String {
        file_path
            .as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
