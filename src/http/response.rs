//! 响应模型
//! 请求结果统一转换为可序列化的 Response：解码正文、计算内容哈希与错误页哈希

use std::collections::HashMap;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::extractor::HtmlExtractor;
use crate::utils::HeaderConverter;

/// 错误页清洗规则：去掉时间、日期、时间戳、路径等易变内容（顺序敏感）
static VOLATILE_CONTENT: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // 时间
        r"(?-u)(\d?\d:?){2,3}",
        r"(?i-u)AM",
        r"(?i-u)PM",
        r"(?-u)\d{13}",
        // 四位年份日期
        r"(?-u)\d{8}",
        r"(?-u)\d{4}-\d{2}-\d{2}",
        r"(?-u)\d{4}/\d{2}/\d{2}",
        r"(?-u)\d{2}-\d{2}-\d{4}",
        r"(?-u)\d{2}/\d{2}/\d{4}",
        // 两位年份日期
        r"(?-u)\d{6}",
        r"(?-u)\d{2}-\d{2}-\d{2}",
        r"(?-u)\d{2}/\d{2}/\d{2}",
        // 链接与路径
        r"(?-u)/[^ ]+",
        r"(?-u)[a-zA-Z]:\\[^ ]+",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// 内容的MD5（小写十六进制）
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

/// 错误页哈希：清洗易变内容后的MD5
pub fn error_fingerprint(page: &[u8]) -> String {
    let mut page = page.to_vec();
    for regex in VOLATILE_CONTENT.iter() {
        page = regex.replace_all(&page, &b""[..]).into_owned();
    }
    md5_hex(&page)
}

/// 按 Content-Type 解码正文
///
/// - 声明了 charset：按该编码解码（未知编码按UTF-8）
/// - text 类型未声明 charset：按 ISO-8859-1 解码
/// - 其余情况：按UTF-8解码，非法字节替换
pub fn decode_body(content_type: Option<&str>, bytes: &[u8]) -> String {
    let encoding = match content_type {
        Some(ct) => match HeaderConverter::charset(ct) {
            Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8),
            None if ct.to_ascii_lowercase().contains("text") => WINDOWS_1252,
            None => UTF_8,
        },
        None => UTF_8,
    };
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// 一次HTTP交互的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// 16位随机标识，别名URL共享同一个 id
    pub id: String,
    pub url: String,
    pub protocol: String,
    pub host: String,
    pub status: u16,
    /// 小写键，同名头保留首个值
    pub headers: HashMap<String, String>,
    pub body: String,
    pub md5: String,
    pub error_hash: String,
    pub error_text_hash: String,
    /// 重定向链上的中间响应（按跳转顺序）
    pub history: Vec<Response>,
    /// 链接发现阶段抓取的响应
    pub crawled: bool,
}

impl Response {
    pub fn from_parts(url: &Url, status: u16, headers: &HeaderMap, bytes: &[u8], history: Vec<Response>) -> Self {
        let headers = HeaderConverter::to_first_value_map(headers);
        let body = decode_body(headers.get("content-type").map(String::as_str), bytes);
        let page_text = HtmlExtractor::new()
            .extract(&String::from_utf8_lossy(bytes))
            .get_text();

        Self {
            id: format!("{:016X}", rand::random::<u64>()),
            url: url.to_string(),
            protocol: url.scheme().to_string(),
            host: url
                .host_str()
                .map(|h| match url.port() {
                    Some(port) => format!("{}:{}", h, port),
                    None => h.to_string(),
                })
                .unwrap_or_default(),
            status,
            headers,
            body,
            md5: md5_hex(bytes),
            error_hash: error_fingerprint(bytes),
            error_text_hash: error_fingerprint(page_text.as_bytes()),
            history,
            crawled: false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 图片资源不参与正文匹配
    pub fn is_image(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("image/"))
    }

    /// URL的路径部分（站点地图使用）
    pub fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone())
    }
}
