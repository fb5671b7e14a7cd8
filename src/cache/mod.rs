//! 缓存模块：扫描期间的响应缓存与磁盘持久化
pub mod response_cache;

pub use self::response_cache::{ResponseCache, CACHE_TTL_SECS};
