//! 规则模块：负责指纹的数据模型、加载与索引
pub mod model;
pub mod loader;
pub mod store;

// 导出核心接口
pub use self::model::{
    Dictionary, DictionaryEntry, OsFingerprint, RawCode, RawFingerprint, RawInteresting,
};
pub use self::loader::{LoadedData, RuleLoader};
pub use self::store::FingerprintStore;
