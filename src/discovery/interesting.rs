//! 常见敏感文件/目录探测

use tracing::debug;

use super::ScanContext;
use crate::detector::ScoreAggregator;
use crate::http::RunMode;
use crate::rule::FingerprintStore;

pub struct InterestingDiscovery;

impl InterestingDiscovery {
    /// `front_page_text_hash` 为首页的文本错误页哈希：重定向回首页的“软404”与其相同
    pub async fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator, front_page_text_hash: Option<&str>) {
        let groups = FingerprintStore::group_by_url(ctx.store.interesting());
        debug!("探测敏感文件，共{}个路径", groups.len());

        for requested in ctx.requester.run(groups, RunMode::Fingerprint).await {
            let Some(response) = requested.response else {
                continue;
            };

            let baseline = ctx.matcher.baseline();
            let is_error_page = baseline.contains(&response.error_hash)
                || baseline.contains(&response.error_text_hash)
                || front_page_text_hash == Some(response.error_text_hash.as_str());
            if is_error_page {
                continue;
            }

            for result in ctx.matcher.evaluate(&requested.group.fingerprints, &response) {
                debug!("发现文件：{}（{}）", result.fingerprint.name, result.output.as_version());
                results.record(&result);
            }
        }
    }
}
