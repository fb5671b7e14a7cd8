//! rswig - Rust Web应用信息收集工具
//! 以最少的请求识别站点的 CMS、平台、JS 库与操作系统，并给出加权排序的版本判断

// 导出全局错误类型
pub use self::error::{WigError, WigResult};

// 导出配置模块
pub use self::config::{ConfigBuilder, ScanConfig, DEFAULT_USER_AGENT};

// 导出规则模块核心接口
pub use self::rule::{FingerprintStore, LoadedData, RuleLoader};

// 导出编译模块核心接口
pub use self::compiler::{
    Category, ExpectedCode, Fingerprint, FingerprintGroup, MatchKind, MatchRule, Pattern, RuleCompiler,
};

// 导出提取模块核心接口
pub use self::extractor::HtmlExtractor;

// 导出工具模块核心接口
pub use self::utils::{HeaderConverter, VersionExtractor};

// 导出请求与缓存
pub use self::http::{Requested, Requester, Response, RunMode};
pub use self::cache::ResponseCache;

// 导出检测模块核心接口
pub use self::detector::{
    DiscoveryOrchestrator, DiscoveryOutcome, DiscoveryState, MatchOutput, MatchResult, Matcher, RankedResults,
    ScoreAggregator,
};

pub use self::report::{ScanReport, Sitemap};
pub use self::scanner::Scanner;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod compiler;
pub mod extractor;
pub mod utils;
pub mod http;
pub mod cache;
pub mod detector;
pub mod discovery;
pub mod report;
pub mod scanner;
