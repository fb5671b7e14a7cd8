//! 指纹编译器核心
//! 负责将原始指纹记录校验并编译为可执行的匹配规则，非法记录在加载阶段拒绝

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::pattern::{Category, ExpectedCode, Fingerprint, MatchKind, MatchRule, Pattern};
use crate::error::{WigError, WigResult};
use crate::rule::model::{RawCode, RawFingerprint, RawInteresting};

/// 指纹编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译单条指纹记录
    pub fn compile(
        name: &str,
        category: Category,
        kind: MatchKind,
        raw: &RawFingerprint,
    ) -> WigResult<Fingerprint> {
        let rule = match kind {
            MatchKind::Md5 => {
                let md5 = Self::require(&raw.md5, "md5")?;
                MatchRule::Md5(md5.trim().to_lowercase())
            }
            MatchKind::String => MatchRule::String(Self::require(&raw.string, "string")?.to_string()),
            MatchKind::Regex => MatchRule::Regex(Self::compile_regex(Self::require(&raw.regex, "regex")?)?),
            MatchKind::Header => {
                let header = Self::require(&raw.header, "header")?;
                let pattern = match (&raw.regex, &raw.string) {
                    (Some(regex), _) => Pattern::Regex(Self::compile_regex(regex)?),
                    (None, Some(s)) => Pattern::Contains(s.clone()),
                    (None, None) => {
                        return Err(WigError::InvalidInput("header 指纹缺少 regex/string 字段".to_string()));
                    }
                };
                MatchRule::Header {
                    name: header.to_lowercase(),
                    pattern,
                }
            }
        };

        Ok(Fingerprint {
            name: name.to_string(),
            category,
            url: raw.url.clone().filter(|u| !u.is_empty()),
            rule,
            output: raw.output.clone().filter(|o| !o.is_empty()),
            code: Self::compile_code(raw.code.as_ref())?,
            weight: Self::compile_weight(raw.weight)?,
            note: raw.note.clone(),
            show_all_detections: raw.show_all_detections.unwrap_or(true),
        })
    }

    /// interesting 记录按扩展名展开为多个指纹
    pub fn compile_interesting(raw: &RawInteresting) -> WigResult<Vec<Fingerprint>> {
        let code = Self::compile_code(raw.code.as_ref())?;
        let urls: Vec<String> = match &raw.ext {
            Some(exts) if !exts.is_empty() => exts.iter().map(|ext| format!("{}.{}", raw.url, ext)).collect(),
            _ => vec![raw.url.clone()],
        };

        Ok(urls
            .into_iter()
            .map(|url| Fingerprint {
                name: url.clone(),
                category: Category::Interesting,
                url: Some(url),
                rule: MatchRule::Exists,
                output: raw.note.clone(),
                code,
                weight: 1.0,
                note: raw.note.clone(),
                show_all_detections: true,
            })
            .collect())
    }

    fn require<'a>(value: &'a Option<String>, field: &str) -> WigResult<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WigError::InvalidInput(format!("缺少 {} 字段", field)))
    }

    fn compile_code(code: Option<&RawCode>) -> WigResult<ExpectedCode> {
        match code {
            None => Ok(ExpectedCode::Ok),
            Some(RawCode::Number(n)) => Ok(ExpectedCode::from_status(*n)),
            Some(RawCode::Text(t)) if t.eq_ignore_ascii_case("any") => Ok(ExpectedCode::Any),
            Some(RawCode::Text(t)) => t
                .parse::<u16>()
                .map(ExpectedCode::from_status)
                .map_err(|_| WigError::InvalidInput(format!("无效状态码：{}", t))),
        }
    }

    fn compile_weight(weight: Option<f64>) -> WigResult<f64> {
        match weight {
            None => Ok(1.0),
            Some(w) if w.is_finite() && w >= 0.0 => Ok(w),
            Some(w) => Err(WigError::InvalidInput(format!("无效权重：{}", w))),
        }
    }

    /// 编译正则（失败时移除环视语法后重试一次）
    pub fn compile_regex(raw_pattern: &str) -> WigResult<Regex> {
        static LOOK_AROUND_REGEX: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"\(\?<?[=!][^)]*\)"#).unwrap()
        });

        let mut cleaned = raw_pattern.to_string();

        // 移除PCRE分隔符
        if cleaned.len() > 1 && cleaned.starts_with('/') && cleaned.ends_with('/') {
            cleaned = cleaned[1..cleaned.len() - 1].to_string();
        }

        match Regex::new(&cleaned) {
            Ok(regex) => Ok(regex),
            Err(first_err) => {
                let stripped = LOOK_AROUND_REGEX.replace_all(&cleaned, "").to_string();
                if stripped == cleaned {
                    return Err(first_err.into());
                }
                debug!("正则含环视语法，移除后重试：{} -> {}", cleaned, stripped);
                Ok(Regex::new(&stripped)?)
            }
        }
    }
}
