//! 错误页基线采集

use std::collections::HashSet;
use tracing::debug;

use super::ScanContext;

pub struct ErrorPageDiscovery;

impl ErrorPageDiscovery {
    /// 请求指纹库中已知不存在的路径，返回站点默认错误页的哈希集合
    pub async fn run(ctx: ScanContext<'_>) -> HashSet<String> {
        let paths = ctx.store.error_pages();
        debug!("错误页检测，共{}个路径", paths.len());
        ctx.requester.harvest_error_hashes(paths).await
    }
}
