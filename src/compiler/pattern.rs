//! 编译后指纹模型
//! 加载阶段校验并编译完成，之后只读

use std::fmt;
use std::sync::Arc;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 指纹分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cms,
    Platform,
    Js,
    Os,
    Interesting,
    Vulnerability,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cms => "cms",
            Category::Platform => "platform",
            Category::Js => "js",
            Category::Os => "os",
            Category::Interesting => "interesting",
            Category::Vulnerability => "vulnerability",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "cms" => Some(Category::Cms),
            "platform" => Some(Category::Platform),
            "js" => Some(Category::Js),
            "os" => Some(Category::Os),
            "interesting" => Some(Category::Interesting),
            "vulnerability" | "vulnerabilities" => Some(Category::Vulnerability),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 匹配类型（判别字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    Md5,
    String,
    Regex,
    Header,
}

impl MatchKind {
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(MatchKind::Md5),
            "string" => Some(MatchKind::String),
            "regex" | "reqex" => Some(MatchKind::Regex),
            "header" => Some(MatchKind::Header),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Contains(String), // 子串匹配
    Regex(Regex),     // 正则匹配
}

impl Pattern {
    /// 简单匹配判断
    pub fn is_match(&self, input: &str) -> bool {
        match self {
            Pattern::Contains(s) => input.contains(s.as_str()),
            Pattern::Regex(regex) => regex.is_match(input),
        }
    }

    /// 规则描述
    pub fn describe(&self) -> &str {
        match self {
            Pattern::Contains(s) => s,
            Pattern::Regex(r) => r.as_str(),
        }
    }
}

/// 各匹配类型的载荷
#[derive(Debug, Clone)]
pub enum MatchRule {
    Md5(String),
    String(String),
    Regex(Regex),
    Header { name: String, pattern: Pattern },
    /// 资源存在即命中（interesting 文件）
    Exists,
}

impl MatchRule {
    pub fn kind(&self) -> Option<MatchKind> {
        match self {
            MatchRule::Md5(_) => Some(MatchKind::Md5),
            MatchRule::String(_) => Some(MatchKind::String),
            MatchRule::Regex(_) => Some(MatchKind::Regex),
            MatchRule::Header { .. } => Some(MatchKind::Header),
            MatchRule::Exists => None,
        }
    }
}

/// 期望的HTTP状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedCode {
    #[default]
    Ok,
    NotFound,
    Other(u16),
    Any,
}

impl ExpectedCode {
    pub fn from_status(code: u16) -> Self {
        match code {
            200 => ExpectedCode::Ok,
            404 => ExpectedCode::NotFound,
            other => ExpectedCode::Other(other),
        }
    }

    /// 允许先用 HEAD 探测
    pub fn allows_head(&self) -> bool {
        matches!(self, ExpectedCode::Ok)
    }
}

/// 编译后的指纹
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub name: String,
    pub category: Category,
    pub url: Option<String>,
    pub rule: MatchRule,
    pub output: Option<String>,
    pub code: ExpectedCode,
    pub weight: f64,
    pub note: Option<String>,
    pub show_all_detections: bool,
}

impl Fingerprint {
    pub fn is_md5(&self) -> bool {
        matches!(self.rule, MatchRule::Md5(_))
    }

    /// 相对URL（无URL时为空串）
    pub fn url_str(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }
}

/// 共享同一相对URL的指纹组：一次请求可验证组内全部指纹
#[derive(Debug, Clone)]
pub struct FingerprintGroup {
    pub url: String,
    pub fingerprints: Vec<Arc<Fingerprint>>,
}

impl FingerprintGroup {
    pub fn new(url: impl Into<String>, fingerprints: Vec<Arc<Fingerprint>>) -> Self {
        Self {
            url: url.into(),
            fingerprints,
        }
    }

    /// 仅有URL、不携带指纹的组（错误页探测、链接发现）
    pub fn bare(url: impl Into<String>) -> Self {
        Self::new(url, Vec::new())
    }

    /// 组内所有指纹都期望200（或未声明）时才可先发HEAD
    pub fn can_use_head(&self) -> bool {
        !self.fingerprints.is_empty() && self.fingerprints.iter().all(|fp| fp.code.allows_head())
    }
}
