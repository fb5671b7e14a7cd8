//! 全局错误类型定义

use thiserror::Error;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum WigError {
    // 扫描范围相关错误
    #[error("超出扫描范围：{from} 跳转到 {to}")]
    ScopeViolation { from: String, to: String },
    #[error("目标已重定向：{from} -> {to}")]
    TargetRedirected { from: String, to: String },
    #[error("无法解析主机：{0}")]
    UnresolvableHost(String),

    // 网络相关错误
    #[error("请求失败：{0}")]
    FetchFailure(String),
    #[error("网络请求失败：{0}")]
    HttpError(#[from] reqwest::Error),

    // 指纹库相关错误
    #[error("指纹文件损坏：{path}，原因：{reason}")]
    CorruptFingerprintFile { path: String, reason: String },
    #[error("正则编译失败：{0}")]
    RegexCompileError(#[from] RegexError),

    // 缓存相关错误
    #[error("缓存读写失败：{0}")]
    CacheIoError(String),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("MessagePack序列化/反序列化失败：{0}")]
    MsgPackError(String),

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
    #[error("扫描已取消")]
    Cancelled,
}

impl WigError {
    /// 是否为目标级致命错误（该目标终止，多目标模式下继续下一个）
    pub fn is_fatal_for_target(&self) -> bool {
        matches!(
            self,
            WigError::UnresolvableHost(_)
                | WigError::TargetRedirected { .. }
                | WigError::UrlError(_)
                | WigError::InvalidInput(_)
                | WigError::Cancelled
        )
    }
}

// 全局Result类型
pub type WigResult<T> = Result<T, WigError>;
