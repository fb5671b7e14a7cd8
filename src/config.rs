//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;
use std::time::Duration;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    // 扫描目标
    pub url: String,
    // 并发请求数（工作池大小）
    pub threads: usize,
    // 每批次处理的指纹组数
    pub batch_size: usize,
    // 识别到多少个CMS后停止
    pub stop_after: usize,
    // 忽略停止条件，跑完全部指纹
    pub run_all: bool,
    // 用全部指纹匹配缓存中的所有响应
    pub match_all: bool,
    // 代理地址
    pub proxy: Option<String>,
    pub user_agent: String,
    // 单个请求超时
    pub timeout: Duration,
    pub no_cache_load: bool,
    pub no_cache_save: bool,
    // 响应缓存目录（None 时使用默认目录）
    pub cache_dir: Option<PathBuf>,
    // 指纹库根目录
    pub data_dir: PathBuf,
    // 目标整体重定向时是否跟随到新地址
    pub follow_redirect: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            threads: 10,
            batch_size: 20,
            stop_after: 1,
            run_all: false,
            match_all: false,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            no_cache_load: false,
            no_cache_save: false,
            cache_dir: None,
            data_dir: PathBuf::from("data"),
            follow_redirect: true,
        }
    }
}

impl ScanConfig {
    /// 目标URL规范化：小写，缺少协议时补 http://
    pub fn normalize_url(url: &str) -> String {
        let url = url.trim().to_lowercase();
        if url.contains("://") {
            url
        } else {
            format!("http://{}", url)
        }
    }

    /// 缓存目录：优先用户指定，其次 $HOME/.rswig_cache，最后当前目录
    pub fn resolve_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".rswig_cache"),
            None => PathBuf::from("./rswig_cache"),
        }
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: ScanConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: &str) -> Self {
        self.config.url = ScanConfig::normalize_url(url);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads.max(1);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size.max(1);
        self
    }

    pub fn stop_after(mut self, stop_after: usize) -> Self {
        self.config.stop_after = stop_after;
        self
    }

    pub fn run_all(mut self, run_all: bool) -> Self {
        self.config.run_all = run_all;
        self
    }

    pub fn match_all(mut self, match_all: bool) -> Self {
        self.config.match_all = match_all;
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.config.proxy = proxy;
        self
    }

    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn no_cache_load(mut self, no_cache_load: bool) -> Self {
        self.config.no_cache_load = no_cache_load;
        self
    }

    pub fn no_cache_save(mut self, no_cache_save: bool) -> Self {
        self.config.no_cache_save = no_cache_save;
        self
    }

    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = dir;
        self
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.config.data_dir = dir;
        self
    }

    pub fn follow_redirect(mut self, follow: bool) -> Self {
        self.config.follow_redirect = follow;
        self
    }

    pub fn build(self) -> ScanConfig {
        self.config
    }
}
