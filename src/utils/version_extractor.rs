//! 版本提取工具模块
//! 负责把正则首个捕获分组代入指纹的输出模板，并清理厂商发布标签前缀
//! 模板支持 %s、\1、$1 三种占位写法

use regex::Captures;

/// 厂商发布标签前缀（后面必须紧跟数字才剥离）
const RELEASE_TAG_PREFIXES: [&str; 7] = ["release-", "release_", "release ", "rel-", "version ", "ver ", "v"];

/// 版本提取工具类
pub struct VersionExtractor;

impl VersionExtractor {
    /// 由输出模板与捕获结果生成版本号
    ///
    /// - 模板含占位符：代入第1个捕获分组（无分组时代入整体匹配）
    /// - 模板不含占位符：原样返回模板
    /// - 代入后为空：返回 None
    pub fn extract(template: &str, captures: &Captures) -> Option<String> {
        let value = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();

        let has_placeholder = ["%s", "\\1", "$1"].iter().any(|p| template.contains(p));
        let version = if has_placeholder {
            template
                .replacen("%s", value, 1)
                .replace("\\1", value)
                .replace("$1", value)
        } else {
            template.to_string()
        };

        let version = Self::clean(&version);
        if version.is_empty() {
            None
        } else {
            Some(version)
        }
    }

    /// 版本清理：去除首尾空白及已知的发布标签前缀
    pub fn clean(version: &str) -> String {
        let trimmed = version.trim();
        let lower = trimmed.to_ascii_lowercase();
        for prefix in RELEASE_TAG_PREFIXES {
            if lower.starts_with(prefix) {
                let rest = &trimmed[prefix.len()..];
                if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    return rest.to_string();
                }
            }
        }
        trimmed.to_string()
    }
}
