//! Header格式转换工具
//! 响应头统一转换为小写键、首值优先的单值映射

use std::collections::HashMap;
use reqwest::header::HeaderMap;
use tracing::warn;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为单值HashMap（键小写，同名头只保留第一个值）
    pub fn to_first_value_map(header_map: &HeaderMap) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(header_map.keys_len());
        let mut iter_count = 0;

        for (key, value) in header_map.iter() {
            iter_count += 1;
            if iter_count > 1000 {
                warn!("Header迭代超过1000次，强制终止");
                break;
            }

            let value_str = String::from_utf8_lossy(value.as_bytes()).into_owned();
            map.entry(key.as_str().to_lowercase()).or_insert(value_str);
        }

        map
    }

    /// 从 Content-Type 中取出 charset 参数
    pub fn charset(content_type: &str) -> Option<&str> {
        content_type
            .split(';')
            .map(str::trim)
            .find_map(|part| {
                let (key, value) = part.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| value.trim().trim_matches('"'))
            })
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SET_COOKIE, SERVER};

    #[test]
    fn test_first_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert(SERVER, HeaderValue::from_static("nginx/1.18.0"));

        let map = HeaderConverter::to_first_value_map(&headers);
        assert_eq!(map.get("set-cookie").map(String::as_str), Some("a=1"));
        assert_eq!(map.get("server").map(String::as_str), Some("nginx/1.18.0"));
    }

    #[test]
    fn test_charset_extraction() {
        assert_eq!(HeaderConverter::charset("text/html; charset=UTF-8"), Some("UTF-8"));
        assert_eq!(HeaderConverter::charset("text/html;Charset=\"gbk\""), Some("gbk"));
        assert_eq!(HeaderConverter::charset("text/html"), None);
    }
}
