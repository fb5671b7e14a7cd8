//! JavaScript 库识别：只匹配缓存中的JS响应

use tracing::debug;

use super::ScanContext;
use crate::compiler::Category;
use crate::detector::ScoreAggregator;
use crate::http::Response;

pub struct JavaScriptDiscovery;

impl JavaScriptDiscovery {
    pub fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        let fingerprints = ctx.store.by_category(Category::Js);
        if fingerprints.is_empty() {
            return;
        }
        for response in ctx.requester.cache().responses() {
            if !Self::is_javascript(&response) {
                continue;
            }
            for result in ctx.matcher.evaluate(fingerprints, &response) {
                debug!("发现JavaScript：{} {}", result.fingerprint.name, result.output.as_version());
                results.record(&result);
            }
        }
    }

    pub fn is_javascript(response: &Response) -> bool {
        response.content_type().is_some_and(|ct| ct.contains("javascript"))
            || response.path().to_lowercase().ends_with(".js")
    }
}
