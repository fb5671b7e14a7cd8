//! 编译模块：将原始指纹记录编译为带判别字段的匹配规则
pub mod pattern;
pub mod compiler;

pub use self::pattern::{
    Category, ExpectedCode, Fingerprint, FingerprintGroup, MatchKind, MatchRule, Pattern,
};
pub use self::compiler::RuleCompiler;
