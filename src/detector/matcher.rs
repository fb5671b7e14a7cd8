//! 指纹匹配器
//! 先过错误页闸门，再按 md5 / string / regex / header 四种策略判断指纹是否命中响应

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::compiler::{ExpectedCode, Fingerprint, MatchRule, Pattern};
use crate::http::Response;
use crate::utils::VersionExtractor;

/// 命中输出：版本号，或仅表示“命中”的占位
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutput {
    Version(String),
    Flag,
}

impl MatchOutput {
    /// 版本字符串（占位输出为空串）
    pub fn as_version(&self) -> &str {
        match self {
            MatchOutput::Version(v) => v,
            MatchOutput::Flag => "",
        }
    }
}

/// 单条命中结果
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub fingerprint: Arc<Fingerprint>,
    pub response: Arc<Response>,
    pub output: MatchOutput,
    pub weight: f64,
}

/// 指纹匹配器，持有错误页哈希基线
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    error_hashes: HashSet<String>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(error_hashes: HashSet<String>) -> Self {
        Self { error_hashes }
    }

    pub fn extend_baseline(&mut self, error_hashes: impl IntoIterator<Item = String>) {
        self.error_hashes.extend(error_hashes);
    }

    pub fn baseline(&self) -> &HashSet<String> {
        &self.error_hashes
    }

    /// 响应是否为错误页：状态码404，或任一错误页哈希在基线中
    pub fn is_erroring(&self, response: &Response) -> bool {
        response.status == 404
            || self.error_hashes.contains(&response.error_hash)
            || self.error_hashes.contains(&response.error_text_hash)
    }

    /// 错误页闸门
    pub fn check_page(&self, fingerprint: &Fingerprint, response: &Response) -> bool {
        match fingerprint.code {
            ExpectedCode::Any => true,
            ExpectedCode::Ok => response.status == 200 && !self.is_erroring(response),
            ExpectedCode::NotFound => self.is_erroring(response),
            ExpectedCode::Other(code) => response.status == code,
        }
    }

    /// 用一组指纹匹配一个响应
    pub fn evaluate(&self, fingerprints: &[Arc<Fingerprint>], response: &Arc<Response>) -> Vec<MatchResult> {
        fingerprints
            .iter()
            .filter(|fp| self.check_page(fp, response))
            .filter_map(|fp| {
                let output = Self::match_rule(fp, response)?;
                debug!(
                    "指纹命中：{} {}，版本={}，URL={}",
                    fp.category,
                    fp.name,
                    output.as_version(),
                    response.url
                );
                Some(MatchResult {
                    fingerprint: fp.clone(),
                    response: response.clone(),
                    output,
                    weight: fp.weight,
                })
            })
            .collect()
    }

    fn match_rule(fp: &Fingerprint, response: &Response) -> Option<MatchOutput> {
        match &fp.rule {
            MatchRule::Md5(md5) => (md5 == &response.md5).then(|| Self::literal_output(fp)),
            MatchRule::String(needle) => {
                if response.is_image() {
                    return None;
                }
                response.body.contains(needle.as_str()).then(|| Self::literal_output(fp))
            }
            MatchRule::Regex(regex) => {
                if response.is_image() {
                    return None;
                }
                let captures = regex.captures(&response.body)?;
                Some(Self::capture_output(fp, &captures))
            }
            MatchRule::Header { name, pattern } => {
                let value = response.header(name)?;
                match pattern {
                    Pattern::Contains(_) => pattern.is_match(value).then(|| Self::literal_output(fp)),
                    Pattern::Regex(regex) => {
                        let captures = regex.captures(value)?;
                        Some(Self::capture_output(fp, &captures))
                    }
                }
            }
            MatchRule::Exists => Some(
                fp.output
                    .clone()
                    .map(MatchOutput::Version)
                    .unwrap_or(MatchOutput::Flag),
            ),
        }
    }

    fn literal_output(fp: &Fingerprint) -> MatchOutput {
        fp.output
            .as_deref()
            .map(VersionExtractor::clean)
            .filter(|v| !v.is_empty())
            .map(MatchOutput::Version)
            .unwrap_or(MatchOutput::Flag)
    }

    fn capture_output(fp: &Fingerprint, captures: &regex::Captures) -> MatchOutput {
        fp.output
            .as_deref()
            .and_then(|template| VersionExtractor::extract(template, captures))
            .map(MatchOutput::Version)
            .unwrap_or(MatchOutput::Flag)
    }
}
