//! 扫描报告
//! 提供给展示层的结果快照：站点信息、排名结果、站点地图与请求统计

use std::collections::BTreeSet;
use std::fmt;
use serde::Serialize;

use crate::cache::ResponseCache;
use crate::detector::RankedResults;

/// 站点地图：缓存中所有URL的路径（去重、排序）
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Sitemap(BTreeSet<String>);

impl Sitemap {
    pub fn from_cache(cache: &ResponseCache) -> Self {
        let paths = cache
            .urls()
            .iter()
            .filter_map(|u| url::Url::parse(u).ok())
            .map(|u| u.path().to_string())
            .collect();
        Self(paths)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 单个目标的扫描报告
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub url: String,
    /// 目标整体重定向时的原始地址
    pub redirected_from: Option<String>,
    pub title: Option<String>,
    pub ip: String,
    pub cookies: BTreeSet<String>,
    pub results: RankedResults,
    pub sitemap: Sitemap,
    /// 不同响应的数量
    pub url_count: usize,
    /// 实际发出的请求数
    pub request_count: usize,
    pub runtime_ms: u128,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.url)?;
        if let Some(from) = &self.redirected_from {
            writeln!(f, "{:<20}{}", "redirected from", from)?;
        }
        writeln!(f, "{:<20}{}", "title", self.title.as_deref().unwrap_or(""))?;
        writeln!(f, "{:<20}{}", "ip", self.ip)?;
        if !self.cookies.is_empty() {
            let cookies: Vec<&str> = self.cookies.iter().map(String::as_str).collect();
            writeln!(f, "{:<20}{}", "cookies", cookies.join(", "))?;
        }
        write!(f, "{}", self.results)?;
        writeln!(
            f,
            "URLs: {} | Requests: {} | Runtime: {:.2}s",
            self.url_count,
            self.request_count,
            self.runtime_ms as f64 / 1000.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use reqwest::header::HeaderMap;
    use std::sync::Arc;

    #[test]
    fn test_sitemap_paths_are_unique_and_sorted() {
        let cache = ResponseCache::new();
        for u in ["http://example.com/b.js", "http://example.com/", "http://example.com/a?x=1", "http://example.com/a"] {
            let url = url::Url::parse(u).unwrap();
            cache.put(u, Arc::new(Response::from_parts(&url, 200, &HeaderMap::new(), b"", Vec::new())));
        }
        let sitemap = Sitemap::from_cache(&cache);
        assert_eq!(sitemap.paths().collect::<Vec<_>>(), vec!["/", "/a", "/b.js"]);
    }
}
