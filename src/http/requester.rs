//! 并发请求器
//! 把指纹组的相对URL解析为目标站点下的绝对URL，经缓存去重后并发抓取
//! 重定向手动跟随，每一跳都做范围检查；一个批次全部完成后才返回

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Method, Proxy};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::response::Response;
use crate::cache::ResponseCache;
use crate::compiler::FingerprintGroup;
use crate::config::ScanConfig;
use crate::error::{WigError, WigResult};

/// 单次抓取最多跟随的重定向次数
pub const MAX_REDIRECTS: usize = 10;

/// 请求用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 指纹探测
    Fingerprint,
    /// 链接发现：响应标记为 crawled
    Crawl,
}

/// 一个指纹组的请求结果；None 表示越界、抓取失败、HEAD 非200或已取消
#[derive(Debug, Clone)]
pub struct Requested {
    pub group: FingerprintGroup,
    pub response: Option<Arc<Response>>,
}

/// 初始重定向探测结果
#[derive(Debug, Clone)]
pub struct RedirectProbe {
    pub redirected: bool,
    /// 最终落地的站点根地址（scheme://host[:port]/）
    pub location: Url,
}

pub struct Requester {
    client: Client,
    base: Url,
    cache: Arc<ResponseCache>,
    threads: usize,
    cancel: CancellationToken,
    request_count: AtomicUsize,
}

impl Requester {
    pub fn new(config: &ScanConfig, cache: Arc<ResponseCache>, cancel: CancellationToken) -> WigResult<Self> {
        let base = Url::parse(&config.url)?;
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(true);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            base,
            cache,
            threads: config.threads.max(1),
            cancel,
            request_count: AtomicUsize::new(0),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// 目标整体重定向后切换到新站点
    pub fn retarget(&mut self, base: Url) {
        self.base = base;
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 实际发出的HTTP请求数
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// 初始重定向探测：自由跟随重定向（不做范围限制），主机无法访问时对该目标致命
    pub async fn detect_redirect(&self) -> WigResult<RedirectProbe> {
        let response = self
            .fetch(&self.base, Method::GET, None, false)
            .await
            .map_err(|e| {
                debug!("初始探测失败：{}，{}", self.base, e);
                WigError::UnresolvableHost(self.base.to_string())
            })?;

        let final_url = Url::parse(&response.url)?;
        let mut location = final_url.clone();
        location.set_path("/");
        location.set_query(None);
        location.set_fragment(None);

        let redirected = final_url.origin() != self.base.origin();
        if redirected {
            debug!("{} 重定向到 {}", self.base, location);
        } else {
            debug!("{} 未重定向", self.base);
        }

        Ok(RedirectProbe { redirected, location })
    }

    /// 并发处理一个批次的指纹组；返回时批次内所有请求均已结束（成功或失败）
    pub async fn run(&self, groups: Vec<FingerprintGroup>, mode: RunMode) -> Vec<Requested> {
        stream::iter(groups)
            .map(|group| self.request(group, mode))
            .buffer_unordered(self.threads)
            .collect()
            .await
    }

    /// 抓取一组已知不存在的路径，收集站点默认错误页的两种哈希
    pub async fn harvest_error_hashes(&self, paths: &[String]) -> HashSet<String> {
        let groups = paths.iter().map(FingerprintGroup::bare).collect();
        let mut hashes = HashSet::new();
        for requested in self.run(groups, RunMode::Fingerprint).await {
            if let Some(response) = requested.response {
                debug!(
                    "错误页指纹：{}，{} - {}",
                    response.error_hash, response.error_text_hash, requested.group.url
                );
                hashes.insert(response.error_hash.clone());
                hashes.insert(response.error_text_hash.clone());
            }
        }
        hashes
    }

    /// 相对URL解析为绝对URL；超出目标范围返回 None
    pub fn resolve(&self, relative: &str) -> Option<Url> {
        let url = self.base.join(relative).ok()?;
        (url.origin() == self.base.origin()).then_some(url)
    }

    async fn request(&self, group: FingerprintGroup, mode: RunMode) -> Requested {
        if self.cancel.is_cancelled() {
            return Requested { group, response: None };
        }
        let response = match self.resolve(&group.url) {
            Some(url) => self.request_group(&group, &url, mode).await,
            None => {
                debug!("超出扫描范围，跳过：{}", group.url);
                None
            }
        };
        Requested { group, response }
    }

    async fn request_group(&self, group: &FingerprintGroup, url: &Url, mode: RunMode) -> Option<Arc<Response>> {
        if let Some(cached) = self.cache.get(url.as_str()) {
            return Some(cached);
        }

        let crawled = mode == RunMode::Crawl;
        let scope = Some(&self.base);

        // 全部指纹期望200时先发 HEAD，只有 HEAD 返回200才继续 GET
        if group.can_use_head() {
            match self.fetch(url, Method::HEAD, scope, crawled).await {
                Ok(head) if head.status == 200 => {}
                Ok(_) => return None,
                Err(e) => {
                    debug!("HEAD 请求失败：{}（指纹组 {}，{}条指纹），{}", url, group.url, group.fingerprints.len(), e);
                    return None;
                }
            }
        }

        match self.fetch(url, Method::GET, scope, crawled).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!("GET 请求失败：{}（指纹组 {}，{}条指纹），{}", url, group.url, group.fingerprints.len(), e);
                None
            }
        }
    }

    /// 抓取并写入缓存：请求URL、最终URL及每一跳URL都指向同一个响应
    ///
    /// `scope` 为 Some 时，跳出该站点的重定向返回 ScopeViolation，不写缓存
    async fn fetch(&self, url: &Url, method: Method, scope: Option<&Url>, crawled: bool) -> WigResult<Arc<Response>> {
        let mut current = url.clone();
        let mut history: Vec<Response> = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let resp = self
                .client
                .request(method.clone(), current.clone())
                .send()
                .await
                .map_err(|e| WigError::FetchFailure(format!("{}：{}", current, e)))?;
            self.request_count.fetch_add(1, Ordering::Relaxed);

            let status = resp.status();
            let headers = resp.headers().clone();
            let next = status
                .is_redirection()
                .then(|| headers.get(LOCATION).and_then(|v| v.to_str().ok()))
                .flatten()
                .and_then(|location| current.join(location).ok());

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| WigError::FetchFailure(format!("{}：{}", current, e)))?;

            let Some(next) = next else {
                let mut response = Response::from_parts(&current, status.as_u16(), &headers, &bytes, history);
                response.crawled = crawled;
                let response = Arc::new(response);

                self.cache.put(url.as_str(), response.clone());
                self.cache.put(current.as_str(), response.clone());
                for hop in &response.history {
                    self.cache.put(hop.url.as_str(), response.clone());
                }
                return Ok(response);
            };

            if let Some(scope) = scope {
                if next.origin() != scope.origin() {
                    debug!("重定向越界：{} -> {}", current, next);
                    return Err(WigError::ScopeViolation {
                        from: current.to_string(),
                        to: next.to_string(),
                    });
                }
            }

            history.push(Response::from_parts(&current, status.as_u16(), &headers, &bytes, Vec::new()));
            current = next;
        }

        Err(WigError::FetchFailure(format!("{}：重定向次数超过{}", url, MAX_REDIRECTS)))
    }
}
