//! 提取模块：负责从响应正文中提取标题、链接与纯文本
pub mod html_extractor;

pub use self::html_extractor::HtmlExtractor;
