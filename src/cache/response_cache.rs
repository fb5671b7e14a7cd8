//! 响应缓存
//! 同一次扫描内按完整URL去重请求；扫描结束后以 MessagePack 持久化，24小时内对同一主机的扫描可复用

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rmp_serde::{Serializer, from_slice};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WigError, WigResult};
use crate::http::Response;

/// 缓存有效期（秒）
pub const CACHE_TTL_SECS: u64 = 60 * 60 * 24;

const CACHE_EXT: &str = ".cache";
const NAME_SEPARATOR: &str = "_-_";

/// 持久化格式：去重后的响应 + URL到响应id的别名表
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedCache {
    responses: Vec<Response>,
    aliases: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Arc<Response>>>,
    location: Mutex<Option<PathBuf>>,
    host_key: Mutex<Option<String>>,
    now: u64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            now: unix_now(),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Response>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, url: &str) -> Option<Arc<Response>> {
        self.lock().get(url).cloned()
    }

    /// 同一URL已存在时覆盖，以最后写入为准
    pub fn put(&self, url: impl Into<String>, response: Arc<Response>) {
        self.lock().insert(url.into(), response);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn urls(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// 全部响应（按 id 去重）
    pub fn responses(&self) -> Vec<Arc<Response>> {
        let entries = self.lock();
        let mut seen = HashSet::new();
        let mut responses: Vec<Arc<Response>> = entries
            .values()
            .filter(|r| seen.insert(r.id.clone()))
            .cloned()
            .collect();
        responses.sort_by(|a, b| a.url.cmp(&b.url));
        responses
    }

    /// 不同响应的数量（同一响应的多个别名只计一次）
    pub fn num_unique(&self) -> usize {
        self.lock().values().map(|r| r.id.as_str()).collect::<HashSet<_>>().len()
    }

    /// 设置缓存目录：不存在则创建，并清理过期的缓存文件
    pub async fn set_location(&self, dir: &Path) -> WigResult<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| WigError::CacheIoError(format!("创建缓存目录失败：{}，{}", dir.display(), e)))?;
        *self.location.lock().unwrap_or_else(|p| p.into_inner()) = Some(dir.to_path_buf());
        self.remove_expired(dir).await;
        Ok(())
    }

    /// 设置缓存归属的主机（如 http://example.com），决定缓存文件名
    pub fn set_host(&self, host: &str) {
        *self.host_key.lock().unwrap_or_else(|p| p.into_inner()) = Some(host_key(host));
    }

    fn location(&self) -> Option<PathBuf> {
        self.location.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn host(&self) -> Option<String> {
        self.host_key.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    async fn remove_expired(&self, dir: &Path) {
        for (path, _, saved_at) in cache_files(dir).await {
            if self.now.saturating_sub(saved_at) > CACHE_TTL_SECS {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!("已删除过期缓存：{}", path.display()),
                    Err(e) => warn!("删除过期缓存失败：{}，{}", path.display(), e),
                }
            }
        }
    }

    /// 持久化到缓存目录；同主机已有缓存文件时复用其文件名
    pub async fn save(&self) -> WigResult<PathBuf> {
        let (Some(dir), Some(host)) = (self.location(), self.host()) else {
            return Err(WigError::CacheIoError("未设置缓存目录或主机".to_string()));
        };

        let persisted = {
            let entries = self.lock();
            let mut persisted = PersistedCache::default();
            let mut seen = HashSet::new();
            for (url, response) in entries.iter() {
                persisted.aliases.insert(url.clone(), response.id.clone());
                if seen.insert(response.id.clone()) {
                    persisted.responses.push(response.as_ref().clone());
                }
            }
            persisted
        };

        let mut data = Vec::new();
        persisted
            .serialize(&mut Serializer::new(&mut data))
            .map_err(|e| WigError::MsgPackError(format!("序列化失败：{}", e)))?;

        let path = cache_files(&dir)
            .await
            .into_iter()
            .find(|(_, name, _)| name == &host)
            .map(|(path, _, _)| path)
            .unwrap_or_else(|| dir.join(format!("{}{}{}{}", host, NAME_SEPARATOR, self.now, CACHE_EXT)));

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| WigError::CacheIoError(format!("写入缓存失败：{}，{}", path.display(), e)))?;
        debug!("缓存已保存：{}（{}个响应）", path.display(), persisted.responses.len());
        Ok(path)
    }

    /// 加载同主机、未过期的缓存，返回加载的URL数
    pub async fn load(&self) -> WigResult<usize> {
        let (Some(dir), Some(host)) = (self.location(), self.host()) else {
            return Ok(0);
        };

        let mut loaded = 0;
        for (path, name, saved_at) in cache_files(&dir).await {
            if name != host || self.now.saturating_sub(saved_at) >= CACHE_TTL_SECS {
                continue;
            }
            // 单个文件损坏时跳过，继续加载其余文件
            let persisted = match read_persisted(&path).await {
                Ok(persisted) => persisted,
                Err(e) => {
                    warn!("缓存文件损坏，已跳过：{}，{}", path.display(), e);
                    continue;
                }
            };

            let by_id: HashMap<String, Arc<Response>> = persisted
                .responses
                .into_iter()
                .map(|r| (r.id.clone(), Arc::new(r)))
                .collect();
            for (url, id) in persisted.aliases {
                if let Some(response) = by_id.get(&id) {
                    self.put(url, response.clone());
                    loaded += 1;
                }
            }
            debug!("已从缓存加载：{}（{}个URL）", path.display(), loaded);
        }
        Ok(loaded)
    }
}

async fn read_persisted(path: &Path) -> WigResult<PersistedCache> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| WigError::CacheIoError(format!("读取缓存失败：{}，{}", path.display(), e)))?;
    from_slice(&data).map_err(|e| WigError::MsgPackError(format!("反序列化失败：{}", e)))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// 主机名转文件名：去掉 `/`，`:` 替换为 `..`
pub fn host_key(host: &str) -> String {
    host.replace('/', "").replace(':', "..")
}

/// 目录下的缓存文件：(路径, 主机键, 保存时间)
async fn cache_files(dir: &Path) -> Vec<(PathBuf, String, u64)> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = file_name.strip_suffix(CACHE_EXT) else {
            continue;
        };
        let Some((host, saved_at)) = stem.rsplit_once(NAME_SEPARATOR) else {
            continue;
        };
        let Ok(saved_at) = saved_at.parse::<u64>() else {
            continue;
        };
        files.push((entry.path(), host.to_string(), saved_at));
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn response(url: &str, body: &str) -> Arc<Response> {
        let url = Url::parse(url).unwrap();
        Arc::new(Response::from_parts(&url, 200, &HeaderMap::new(), body.as_bytes(), Vec::new()))
    }

    #[test]
    fn test_host_key() {
        assert_eq!(host_key("http://example.com:8080"), "http..example.com..8080");
    }

    #[test]
    fn test_aliases_count_once() {
        let cache = ResponseCache::new();
        let r = response("http://example.com/", "home");
        cache.put("http://example.com", r.clone());
        cache.put("http://example.com/", r);
        cache.put("http://example.com/a", response("http://example.com/a", "a"));

        assert_eq!(cache.urls().len(), 3);
        assert_eq!(cache.num_unique(), 2);
        assert_eq!(cache.responses().len(), 2);
        assert!(cache.contains("http://example.com"));
        assert!(cache.get("http://example.com/b").is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();

        let cache = ResponseCache::new();
        cache.set_location(tmp.path()).await.unwrap();
        cache.set_host("http://example.com");
        let r = response("http://example.com/", "home");
        cache.put("http://example.com", r.clone());
        cache.put("http://example.com/", r.clone());
        let path = cache.save().await.unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("http..example.com_-_"));

        let reloaded = ResponseCache::new();
        reloaded.set_location(tmp.path()).await.unwrap();
        reloaded.set_host("http://example.com");
        assert_eq!(reloaded.load().await.unwrap(), 2);
        assert_eq!(reloaded.num_unique(), 1);
        assert_eq!(reloaded.get("http://example.com").unwrap().id, r.id);

        let other = ResponseCache::new();
        other.set_location(tmp.path()).await.unwrap();
        other.set_host("http://other.example");
        assert_eq!(other.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_cache_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join(format!("http..example.com_-_{}.cache", unix_now() - CACHE_TTL_SECS - 10));
        std::fs::write(&stale, b"stale").unwrap();

        let cache = ResponseCache::new();
        cache.set_location(tmp.path()).await.unwrap();
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_corrupt_cache_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();

        let cache = ResponseCache::new();
        cache.set_location(tmp.path()).await.unwrap();
        cache.set_host("http://example.com");
        cache.put("http://example.com/", response("http://example.com/", "home"));
        let valid = cache.save().await.unwrap();

        // 文件名排序在有效缓存之前
        let corrupt = tmp.path().join(format!("http..example.com_-_{}.cache", unix_now() - 1000));
        std::fs::write(&corrupt, b"garbage, not msgpack").unwrap();
        assert!(corrupt < valid);

        let reloaded = ResponseCache::new();
        reloaded.set_location(tmp.path()).await.unwrap();
        reloaded.set_host("http://example.com");
        assert_eq!(reloaded.load().await.unwrap(), 1);
        assert_eq!(reloaded.get("http://example.com/").unwrap().body, "home");
    }

    #[tokio::test]
    async fn test_save_reuses_existing_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join(format!("http..example.com_-_{}.cache", unix_now() - 60));
        std::fs::write(&existing, b"").unwrap();

        let cache = ResponseCache::new();
        cache.set_location(tmp.path()).await.unwrap();
        cache.set_host("http://example.com");
        cache.put("http://example.com/", response("http://example.com/", "home"));
        assert_eq!(cache.save().await.unwrap(), existing);
    }
}
