//! 站点信息发现：CMS识别之外的各个扫描阶段
//! 各阶段共享同一个请求器（及其缓存）、匹配器和指纹库

pub mod site;
pub mod error_page;
pub mod platform;
pub mod interesting;
pub mod crawl;
pub mod javascript;
pub mod urlless;
pub mod os;

use crate::detector::Matcher;
use crate::http::Requester;
use crate::rule::FingerprintStore;

pub use self::site::SiteInfo;
pub use self::error_page::ErrorPageDiscovery;
pub use self::platform::PlatformDiscovery;
pub use self::interesting::InterestingDiscovery;
pub use self::crawl::LinkDiscovery;
pub use self::javascript::JavaScriptDiscovery;
pub use self::urlless::{MatchAllDiscovery, UrlLessDiscovery};
pub use self::os::OsDiscovery;

/// 扫描阶段共享的依赖
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub store: &'a FingerprintStore,
    pub requester: &'a Requester,
    pub matcher: &'a Matcher,
    pub batch_size: usize,
}

/// Server 头解析结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServerHeader {
    /// (包名, 版本)，均为小写；无版本时版本为空串
    pub packages: Vec<(String, String)>,
    /// 括号中的操作系统注释，如 `Apache/2.4.29 (Ubuntu)` 中的 Ubuntu
    pub os: Option<String>,
}

impl ServerHeader {
    pub fn parse(line: &str) -> Self {
        let mut os = None;
        let mut line = line.to_string();

        if let Some(open) = line.find('(') {
            let close = line[open..].find(')').map(|c| open + c);
            let comment = &line[open + 1..close.unwrap_or(line.len())];
            os = Some(match comment.trim() {
                "Red Hat" => "Red Hat Enterprise Linux".to_string(),
                other => other.to_string(),
            });
            let tail = close.map(|c| line[c + 1..].to_string()).unwrap_or_default();
            line = format!("{}{}", line[..open].trim_end(), tail);
        }

        let packages = line
            .split_whitespace()
            .filter_map(|part| {
                let pieces: Vec<String> = part.split('/').map(str::to_lowercase).collect();
                match pieces.as_slice() {
                    [pkg] => Some((pkg.clone(), String::new())),
                    [pkg, version] => Some((pkg.clone(), version.clone())),
                    _ => None,
                }
            })
            .collect();

        Self {
            packages,
            os: os.filter(|o| !o.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_header() {
        let header = ServerHeader::parse("Apache/2.4.29 (Ubuntu) OpenSSL/1.1.1");
        assert_eq!(header.os.as_deref(), Some("Ubuntu"));
        assert_eq!(
            header.packages,
            vec![
                ("apache".to_string(), "2.4.29".to_string()),
                ("openssl".to_string(), "1.1.1".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_server_header_without_version() {
        let header = ServerHeader::parse("nginx");
        assert_eq!(header.os, None);
        assert_eq!(header.packages, vec![("nginx".to_string(), String::new())]);

        let header = ServerHeader::parse("Apache/2.2.15 (Red Hat)");
        assert_eq!(header.os.as_deref(), Some("Red Hat Enterprise Linux"));

        assert!(ServerHeader::parse("a/b/c").packages.is_empty());
    }
}
