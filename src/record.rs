//! 日志记录的渲染接口
//!
//! 格式化策略由外部的格式化器决定，路由器只需要拿到最终文本。

use std::borrow::Cow;

/// 可以渲染成一行（或多行）文本的日志记录。
///
/// 行尾换行符由实现方负责，sink 原样写出。
pub trait Render {
    fn render(&self) -> Cow<'_, str>;
}

impl Render for str {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Render for String {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl<T: Render + ?Sized> Render for &T {
    fn render(&self) -> Cow<'_, str> {
        (**self).render()
    }
}
