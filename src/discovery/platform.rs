//! 平台识别
//! 先分批请求平台指纹，再解析缓存中所有响应的 Server 头

use tracing::debug;

use super::{ScanContext, ServerHeader};
use crate::compiler::Category;
use crate::detector::ScoreAggregator;
use crate::http::RunMode;
use crate::rule::FingerprintStore;

pub struct PlatformDiscovery;

impl PlatformDiscovery {
    pub async fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        let groups = FingerprintStore::group_by_url(ctx.store.by_category(Category::Platform));
        debug!("识别平台，共{}个指纹组", groups.len());

        let mut groups = groups.into_iter().peekable();
        while groups.peek().is_some() {
            if ctx.requester.is_cancelled() {
                return;
            }
            let batch = groups.by_ref().take(ctx.batch_size.max(1)).collect();
            for requested in ctx.requester.run(batch, RunMode::Fingerprint).await {
                let Some(response) = requested.response else {
                    continue;
                };
                for result in ctx.matcher.evaluate(&requested.group.fingerprints, &response) {
                    results.record(&result);
                }
            }
        }

        Self::record_server_headers(ctx, results);
    }

    /// Server 头中的 `包名/版本`，包名经字典翻译后记为平台证据
    pub fn record_server_headers(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        for response in ctx.requester.cache().responses() {
            let Some(line) = response.header("server") else {
                continue;
            };
            for (pkg, version) in ServerHeader::parse(line).packages {
                let name = ctx.store.translate(&pkg).map(str::to_string).unwrap_or(pkg);
                debug!("Server 头平台：{} {}（{}）", name, version, response.url);
                results.add_direct(Category::Platform, &name, &version, 1.0);
            }
        }
    }
}
