//! 操作系统推断
//! Server 头中的软件包版本与平台识别结果，对照各发行版自带的软件包版本

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::{ScanContext, ServerHeader};
use crate::compiler::Category;
use crate::detector::{ScoreAggregator, ScoreTable};
use crate::rule::OsFingerprint;

/// Server 头中出现过的系统家族，其候选权重放大的倍数
const FAMILY_BOOST: f64 = 100.0;

pub struct OsDiscovery;

impl OsDiscovery {
    pub fn run(ctx: ScanContext<'_>, results: &mut ScoreAggregator) {
        let headers: Vec<ServerHeader> = ctx
            .requester
            .cache()
            .responses()
            .iter()
            .filter_map(|r| r.header("server"))
            .map(ServerHeader::parse)
            .collect();

        let candidates = Self::infer(ctx.store.os(), &headers, &results.snapshot());
        for (os_name, os_version, weight) in candidates {
            debug!("推断操作系统：{} {}", os_name, os_version);
            results.add_direct(Category::Os, &os_name, &os_version, weight);
        }
    }

    /// 返回得分最高的 (系统名, 版本, 得分)，并列全部返回
    pub fn infer(
        fingerprints: &[OsFingerprint],
        headers: &[ServerHeader],
        platforms: &ScoreTable,
    ) -> Vec<(String, String, f64)> {
        let families: HashSet<String> = headers
            .iter()
            .filter_map(|h| h.os.as_ref())
            .map(|os| os.to_lowercase())
            .collect();

        let mut scores: BTreeMap<(String, String), f64> = BTreeMap::new();
        let mut search = |pkg: &str, version: &str| {
            for fp in fingerprints {
                if !fp.pkg_name.eq_ignore_ascii_case(pkg) || !fp.pkg_version.eq_ignore_ascii_case(version) {
                    continue;
                }
                let boost = if families.contains(&fp.os_name.to_lowercase()) {
                    FAMILY_BOOST
                } else {
                    1.0
                };
                for os_version in &fp.os_versions {
                    *scores.entry((fp.os_name.clone(), os_version.clone())).or_default() += fp.weight * boost;
                }
            }
        };

        for header in headers {
            for (pkg, version) in &header.packages {
                if !version.is_empty() {
                    search(pkg, version);
                }
            }
        }

        if let Some(by_name) = platforms.get(&Category::Platform) {
            for (pkg, by_version) in by_name {
                for version in by_version.keys() {
                    let version = if pkg == "ASP.NET" {
                        Self::truncate_aspnet(version)
                    } else {
                        version.as_str()
                    };
                    search(pkg, version);
                }
            }
        }

        let Some(max) = scores.values().copied().reduce(f64::max) else {
            return Vec::new();
        };
        scores
            .into_iter()
            .filter(|(_, weight)| (max - weight).abs() < 1e-9)
            .map(|((name, version), weight)| (name, version, weight))
            .collect()
    }

    /// ASP.NET 只取主版本：一般取前3位，4.5.x 取前5位
    fn truncate_aspnet(version: &str) -> &str {
        let len = if version.starts_with("4.5") { 5 } else { 3 };
        version.get(..len).unwrap_or(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_fp(pkg: &str, pkg_version: &str, os: &str, versions: &[&str]) -> OsFingerprint {
        OsFingerprint {
            pkg_name: pkg.to_string(),
            pkg_version: pkg_version.to_string(),
            os_name: os.to_string(),
            os_versions: versions.iter().map(|v| v.to_string()).collect(),
            weight: 1.0,
        }
    }

    #[test]
    fn test_family_in_header_is_prioritized() {
        let fps = vec![
            os_fp("apache", "2.4.29", "Ubuntu", &["18.04"]),
            os_fp("apache", "2.4.29", "Debian", &["9", "10"]),
            os_fp("openssl", "1.1.1", "Debian", &["10"]),
        ];
        let headers = vec![ServerHeader::parse("Apache/2.4.29 (Ubuntu)")];
        let result = OsDiscovery::infer(&fps, &headers, &ScoreTable::new());
        assert_eq!(result, vec![("Ubuntu".to_string(), "18.04".to_string(), 100.0)]);
    }

    #[test]
    fn test_ties_without_family() {
        let fps = vec![
            os_fp("nginx", "1.14.0", "Ubuntu", &["18.04"]),
            os_fp("nginx", "1.14.0", "Debian", &["10"]),
        ];
        let headers = vec![ServerHeader::parse("nginx/1.14.0")];
        let result = OsDiscovery::infer(&fps, &headers, &ScoreTable::new());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_aspnet_version_from_platform_results() {
        let fps = vec![
            os_fp("ASP.NET", "4.5.2", "Windows Server", &["2012 R2"]),
            os_fp("ASP.NET", "2.0", "Windows Server", &["2003"]),
        ];
        let mut agg = ScoreAggregator::new();
        agg.add_direct(Category::Platform, "ASP.NET", "4.5.2.1", 1.0);
        let result = OsDiscovery::infer(&fps, &[], &agg.snapshot());
        assert_eq!(result, vec![("Windows Server".to_string(), "2012 R2".to_string(), 1.0)]);

        assert_eq!(OsDiscovery::truncate_aspnet("2.0.50727"), "2.0");
        assert_eq!(OsDiscovery::truncate_aspnet("4"), "4");
    }

    #[test]
    fn test_no_match_yields_nothing() {
        let headers = vec![ServerHeader::parse("Microsoft-IIS/10.0")];
        assert!(OsDiscovery::infer(&[], &headers, &ScoreTable::new()).is_empty());
    }
}
