//! 站点基础信息：标题、IP、Cookie

use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

use super::ScanContext;
use crate::cache::ResponseCache;
use crate::compiler::FingerprintGroup;
use crate::extractor::HtmlExtractor;
use crate::http::RunMode;

pub struct SiteInfo;

impl SiteInfo {
    /// 站点标题：通过请求器获取首页（通常已在缓存中），取 title 标签文本
    pub async fn title(ctx: ScanContext<'_>) -> Option<String> {
        let requested = ctx
            .requester
            .run(vec![FingerprintGroup::bare("/")], RunMode::Fingerprint)
            .await;
        let front_page = requested.into_iter().find_map(|r| r.response)?;
        let title = HtmlExtractor::new().extract(&front_page.body).get_title();
        debug!("站点标题：{:?}", title);
        title
    }

    /// 目标主机的IP，解析失败时返回 "Unknown"
    pub async fn ip(url: &Url) -> String {
        let Some(host) = url.host_str() else {
            return "Unknown".to_string();
        };
        let port = url.port_or_known_default().unwrap_or(80);
        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => addrs
                .next()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            Err(e) => {
                debug!("解析IP失败：{}，{}", host, e);
                "Unknown".to_string()
            }
        }
    }

    /// 缓存中各响应 Set-Cookie 的名称
    pub fn cookies(cache: &ResponseCache) -> BTreeSet<String> {
        cache
            .responses()
            .iter()
            .filter_map(|r| r.header("set-cookie"))
            .filter_map(|cookie| cookie.trim().split('=').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
    use std::sync::Arc;

    #[test]
    fn test_cookie_names() {
        let cache = ResponseCache::new();
        let url = Url::parse("http://example.com/").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("PHPSESSID=abc; path=/"));
        cache.put("http://example.com/", Arc::new(Response::from_parts(&url, 200, &headers, b"", Vec::new())));

        let url = Url::parse("http://example.com/a").unwrap();
        cache.put("http://example.com/a", Arc::new(Response::from_parts(&url, 200, &HeaderMap::new(), b"", Vec::new())));

        let cookies = SiteInfo::cookies(&cache);
        assert_eq!(cookies.into_iter().collect::<Vec<_>>(), vec!["PHPSESSID".to_string()]);
    }

    #[tokio::test]
    async fn test_ip_of_localhost() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(SiteInfo::ip(&url).await, "127.0.0.1");
    }
}
