//! 检测模块：指纹匹配、结果汇总与CMS发现调度
pub mod matcher;
pub mod results;
pub mod orchestrator;

// 导出核心接口
pub use self::matcher::{MatchOutput, MatchResult, Matcher};
pub use self::results::{RankedResults, ScoreAggregator, ScoreTable};
pub use self::orchestrator::{DiscoveryOrchestrator, DiscoveryOutcome, DiscoveryState};
