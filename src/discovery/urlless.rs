//! 事后匹配：用指纹直接匹配缓存中已有的响应，不再发请求

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::ScanContext;
use crate::compiler::{Category, Fingerprint};
use crate::detector::ScoreAggregator;

const CACHED_CATEGORIES: [Category; 2] = [Category::Cms, Category::Platform];

/// 无URL指纹：匹配缓存中的全部响应
pub struct UrlLessDiscovery;

impl UrlLessDiscovery {
    pub fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        let responses = ctx.requester.cache().responses();
        // 已报告过的 (软件名, 版本)；show_all_detections 为 false 的指纹同一结果只记一次
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for category in CACHED_CATEGORIES {
            let fingerprints = ctx.store.url_less(category);
            if fingerprints.is_empty() {
                continue;
            }
            for response in &responses {
                for result in ctx.matcher.evaluate(fingerprints, response) {
                    let key = (result.fingerprint.name.clone(), result.output.as_version().to_string());
                    let first = seen.insert(key);
                    if first {
                        debug!(
                            "无URL指纹命中：{} {}（{}）",
                            result.fingerprint.name,
                            result.output.as_version(),
                            response.path()
                        );
                    }
                    if first || result.fingerprint.show_all_detections {
                        results.record(&result);
                    }
                }
            }
        }
    }
}

/// match-all 模式：全部 cms/platform 指纹匹配缓存中的全部响应（可能产生误报）
pub struct MatchAllDiscovery;

impl MatchAllDiscovery {
    pub fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        let responses = ctx.requester.cache().responses();
        for category in CACHED_CATEGORIES {
            let fingerprints: &[Arc<Fingerprint>] = ctx.store.by_category(category);
            for response in &responses {
                for result in ctx.matcher.evaluate(fingerprints, response) {
                    results.record(&result);
                }
            }
        }
        debug!("match-all 完成，共检查{}个响应", responses.len());
    }
}
