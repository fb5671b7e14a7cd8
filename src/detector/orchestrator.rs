//! CMS发现调度器
//! 两阶段：广度优先分批扫描；一旦某个CMS命中，立即把它剩余的指纹从共享队列取出单独请求以确定版本

use std::collections::VecDeque;
use tracing::{debug, info};

use super::matcher::Matcher;
use super::results::ScoreAggregator;
use crate::compiler::FingerprintGroup;
use crate::http::{Requester, RunMode};

/// 调度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Scanning,
    VersionRefine,
    Done,
}

/// 调度结束后的汇总
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub state: DiscoveryState,
    /// 已完成版本细化的CMS（按发现顺序）
    pub detected: Vec<String>,
    /// 扫描阶段执行的批次数
    pub batches: usize,
    /// 停止时队列中剩余的指纹组数
    pub remaining: usize,
}

pub struct DiscoveryOrchestrator<'a> {
    requester: &'a Requester,
    matcher: &'a Matcher,
    results: &'a mut ScoreAggregator,
    queue: VecDeque<FingerprintGroup>,
    batch_size: usize,
    stop_after: usize,
    run_all: bool,
    state: DiscoveryState,
    detected: Vec<String>,
    batches: usize,
}

impl<'a> DiscoveryOrchestrator<'a> {
    pub fn new(
        requester: &'a Requester,
        matcher: &'a Matcher,
        results: &'a mut ScoreAggregator,
        queue: Vec<FingerprintGroup>,
    ) -> Self {
        Self {
            requester,
            matcher,
            results,
            queue: queue.into(),
            batch_size: 20,
            stop_after: 1,
            run_all: false,
            state: DiscoveryState::Scanning,
            detected: Vec::new(),
            batches: 0,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn stop_after(mut self, stop_after: usize) -> Self {
        self.stop_after = stop_after;
        self
    }

    pub fn run_all(mut self, run_all: bool) -> Self {
        self.run_all = run_all;
        self
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    fn should_stop(&self) -> bool {
        !self.run_all && self.detected.len() >= self.stop_after
    }

    pub async fn run(mut self) -> DiscoveryOutcome {
        debug!("开始识别CMS，队列中共{}个指纹组", self.queue.len());

        while !self.queue.is_empty() && !self.should_stop() {
            if self.requester.is_cancelled() {
                debug!("扫描已取消，停止CMS识别");
                break;
            }
            self.state = DiscoveryState::Scanning;

            let take = self.batch_size.min(self.queue.len());
            let batch: Vec<FingerprintGroup> = self.queue.drain(..take).collect();
            debug!("检查第{}批指纹组（{}个）", self.batches, batch.len());

            let mut found: Vec<String> = Vec::new();
            for requested in self.requester.run(batch, RunMode::Fingerprint).await {
                let Some(response) = requested.response else {
                    continue;
                };
                for result in self.matcher.evaluate(&requested.group.fingerprints, &response) {
                    self.results.record(&result);
                    if !found.contains(&result.fingerprint.name) {
                        found.push(result.fingerprint.name.clone());
                    }
                }
            }

            for cms in found {
                if self.detected.contains(&cms) {
                    continue;
                }
                info!("识别到CMS：{}", cms);
                self.state = DiscoveryState::VersionRefine;
                self.refine(&cms).await;
                self.detected.push(cms);
            }

            self.batches += 1;
        }

        self.state = DiscoveryState::Done;
        DiscoveryOutcome {
            state: self.state,
            detected: self.detected,
            batches: self.batches,
            remaining: self.queue.len(),
        }
    }

    /// 版本细化：取出该CMS在队列中的全部剩余指纹，分批请求
    async fn refine(&mut self, cms: &str) {
        let groups = self.take_cms(cms);
        debug!("确定 {} 的版本，共{}个指纹组", cms, groups.len());

        let mut groups = groups.into_iter().peekable();
        while groups.peek().is_some() {
            let batch: Vec<FingerprintGroup> = groups.by_ref().take(self.batch_size).collect();
            for requested in self.requester.run(batch, RunMode::Fingerprint).await {
                let Some(response) = requested.response else {
                    continue;
                };
                for result in self.matcher.evaluate(&requested.group.fingerprints, &response) {
                    self.results.record(&result);
                }
            }
        }
    }

    /// 从共享队列中拆出属于指定CMS的指纹；其余指纹留在原位
    fn take_cms(&mut self, cms: &str) -> Vec<FingerprintGroup> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.queue.len());
        for group in self.queue.drain(..) {
            let (mine, others): (Vec<_>, Vec<_>) = group
                .fingerprints
                .into_iter()
                .partition(|fp| fp.name == cms);
            if !mine.is_empty() {
                taken.push(FingerprintGroup::new(group.url.clone(), mine));
            }
            if !others.is_empty() {
                kept.push_back(FingerprintGroup::new(group.url, others));
            }
        }
        self.queue = kept;
        taken
    }
}
