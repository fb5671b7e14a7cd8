//! 扫描入口
//! 按固定顺序串联各扫描阶段；每个目标使用独立的缓存与结果表

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::config::ScanConfig;
use crate::detector::{DiscoveryOrchestrator, Matcher, ScoreAggregator};
use crate::discovery::{
    ErrorPageDiscovery, InterestingDiscovery, JavaScriptDiscovery, LinkDiscovery, MatchAllDiscovery,
    OsDiscovery, PlatformDiscovery, ScanContext, SiteInfo, UrlLessDiscovery,
};
use crate::error::{WigError, WigResult};
use crate::http::Requester;
use crate::report::{ScanReport, Sitemap};
use crate::rule::FingerprintStore;

pub struct Scanner {
    config: ScanConfig,
    store: Arc<FingerprintStore>,
    cancel: CancellationToken,
}

impl Scanner {
    pub fn new(config: ScanConfig, store: Arc<FingerprintStore>) -> Self {
        Self {
            config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// 使用外部的取消令牌（如 Ctrl-C）
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 依次扫描多个目标；单个目标的致命错误不影响后续目标
    pub async fn run(&self, targets: &[String]) -> Vec<(String, WigResult<ScanReport>)> {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            if self.cancel.is_cancelled() {
                break;
            }
            let result = self.scan(target).await;
            if let Err(e) = &result {
                warn!("扫描 {} 失败：{}", target, e);
            }
            reports.push((target.clone(), result));
        }
        reports
    }

    /// 扫描单个目标
    pub async fn scan(&self, target: &str) -> WigResult<ScanReport> {
        let started = Instant::now();
        let mut config = self.config.clone();
        config.url = ScanConfig::normalize_url(target);
        info!("开始扫描：{}", config.url);

        let cache = Arc::new(ResponseCache::new());
        let mut requester = Requester::new(&config, cache.clone(), self.cancel.clone())?;

        // 初始重定向探测
        let probe = requester.detect_redirect().await?;
        let mut redirected_from = None;
        if probe.redirected {
            if !config.follow_redirect {
                return Err(WigError::TargetRedirected {
                    from: requester.base().to_string(),
                    to: probe.location.to_string(),
                });
            }
            info!("{} 重定向到 {}，改为扫描新地址", requester.base(), probe.location);
            redirected_from = Some(requester.base().to_string());
            requester.retarget(probe.location.clone());
        }
        let base = requester.base().clone();

        // 缓存身份与加载
        let persist = !(config.no_cache_load && config.no_cache_save);
        if persist {
            match cache.set_location(&config.resolve_cache_dir()).await {
                Ok(()) => {
                    cache.set_host(&base.origin().ascii_serialization());
                    if !config.no_cache_load {
                        match cache.load().await {
                            Ok(n) => debug!("从缓存加载{}个URL", n),
                            Err(e) => warn!("加载缓存失败，忽略：{}", e),
                        }
                    }
                }
                Err(e) => warn!("缓存目录不可用，本次扫描不使用持久化缓存：{}", e),
            }
        }

        // 标题、IP、错误页基线
        let plain = Matcher::new();
        let ctx = ScanContext {
            store: &self.store,
            requester: &requester,
            matcher: &plain,
            batch_size: config.batch_size,
        };
        let title = SiteInfo::title(ctx).await;
        let ip = SiteInfo::ip(&base).await;
        let matcher = Matcher::with_baseline(ErrorPageDiscovery::run(ctx).await);
        let ctx = ScanContext { matcher: &matcher, ..ctx };

        let mut results = ScoreAggregator::new();

        let outcome = DiscoveryOrchestrator::new(&requester, &matcher, &mut results, self.store.ordered_cms_queue())
            .batch_size(config.batch_size)
            .stop_after(config.stop_after)
            .run_all(config.run_all)
            .run()
            .await;
        debug!(
            "CMS识别结束：{:?}，{}批，识别到 {:?}，队列剩余{}",
            outcome.state, outcome.batches, outcome.detected, outcome.remaining
        );
        self.check_cancelled()?;

        PlatformDiscovery::run(ctx, &mut results).await;
        self.check_cancelled()?;

        let front_page_text_hash = cache.get(base.as_str()).map(|r| r.error_text_hash.clone());
        InterestingDiscovery::run(ctx, &mut results, front_page_text_hash.as_deref()).await;
        self.check_cancelled()?;

        LinkDiscovery::run(ctx).await;
        self.check_cancelled()?;

        JavaScriptDiscovery::run(ctx, &mut results);
        UrlLessDiscovery::run(ctx, &mut results);
        let cookies = SiteInfo::cookies(&cache);
        OsDiscovery::run(ctx, &mut results);
        if config.match_all {
            MatchAllDiscovery::run(ctx, &mut results);
        }

        let ranked = results.finalize();

        if persist && !config.no_cache_save {
            match cache.save().await {
                Ok(path) => debug!("缓存已保存到：{}", path.display()),
                Err(e) => warn!("保存缓存失败：{}", e),
            }
        }

        Ok(ScanReport {
            url: base.to_string(),
            redirected_from,
            title,
            ip,
            cookies,
            results: ranked,
            sitemap: Sitemap::from_cache(&cache),
            url_count: cache.num_unique(),
            request_count: requester.request_count(),
            runtime_ms: started.elapsed().as_millis(),
        })
    }

    fn check_cancelled(&self) -> WigResult<()> {
        if self.cancel.is_cancelled() {
            Err(WigError::Cancelled)
        } else {
            Ok(())
        }
    }
}
