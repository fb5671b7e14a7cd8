//! HTTP模块：响应模型与并发请求器
pub mod response;
pub mod requester;

pub use self::response::{decode_body, error_fingerprint, md5_hex, Response};
pub use self::requester::{RedirectProbe, Requested, Requester, RunMode, MAX_REDIRECTS};
