//! 链接发现
//! 从已缓存的HTML页面中提取 script/img 的 src 与 link 的 href，各请求一次，不递归

use std::collections::BTreeSet;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::ScanContext;
use crate::compiler::FingerprintGroup;
use crate::extractor::HtmlExtractor;
use crate::http::{Response, RunMode};

/// 只取 src 属性，避免沿 a 标签爬遍整个站点
static SRC_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"src=(?:"([^"]+?)"|'([^']+?)')"#).unwrap());

pub struct LinkDiscovery;

impl LinkDiscovery {
    /// 返回发现的资源数
    pub async fn run(ctx: ScanContext<'_>) -> usize {
        let mut resources = BTreeSet::new();
        for response in ctx.requester.cache().responses() {
            resources.extend(Self::links(&response));
        }
        debug!("发现{}个新资源", resources.len());

        let count = resources.len();
        let groups = resources.into_iter().map(FingerprintGroup::bare).collect();
        ctx.requester.run(groups, RunMode::Crawl).await;
        count
    }

    /// 单个响应中的链接；非HTML响应和链接发现阶段抓取的响应不提取
    pub fn links(response: &Response) -> BTreeSet<String> {
        let mut links = BTreeSet::new();
        if response.crawled {
            return links;
        }
        let Some(content_type) = response.content_type() else {
            return links;
        };
        if !content_type.contains("text/html") {
            return links;
        }

        for captures in SRC_ATTR.captures_iter(&response.body) {
            if let Some(m) = captures.get(1).or_else(|| captures.get(2)) {
                links.insert(m.as_str().trim().to_string());
            }
        }
        links.extend(HtmlExtractor::new().extract(&response.body).get_links());
        links.retain(|link| !link.is_empty() && !link.starts_with("data:"));
        links
    }
}
