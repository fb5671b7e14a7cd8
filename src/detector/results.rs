//! 检测结果汇总
//! 按 (分类, 软件名, 版本) 累加权重；md5 证据先进入按URL分桶的账本，扫描结束时统一折算
//! 最终每个软件只保留权重最高的版本（并列全部保留）

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use serde::Serialize;

use super::matcher::MatchResult;
use crate::compiler::Category;

/// 分类 -> 软件名 -> 版本 -> 累计权重
pub type ScoreTable = BTreeMap<Category, BTreeMap<String, BTreeMap<String, f64>>>;

/// 并列判断的浮点容差
const WEIGHT_EPSILON: f64 = 1e-9;

/// 检测结果汇总器
#[derive(Debug, Default, Clone)]
pub struct ScoreAggregator {
    scores: ScoreTable,
    // URL -> (分类, 软件名) -> 观察到的版本（可重复）
    md5_ledger: HashMap<String, HashMap<(Category, String), Vec<String>>>,
}

impl ScoreAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录 md5 证据，权重在 finalize 时按URL折算
    pub fn add_md5(&mut self, url: &str, category: Category, name: &str, version: &str) {
        self.md5_ledger
            .entry(url.to_string())
            .or_default()
            .entry((category, name.to_string()))
            .or_default()
            .push(version.to_string());
    }

    /// 记录 string/regex/header 等直接证据；空版本只记为“出现过”，权重为0
    pub fn add_direct(&mut self, category: Category, name: &str, version: &str, weight: f64) {
        let weight = if version.is_empty() { 0.0 } else { weight.max(0.0) };
        *self
            .scores
            .entry(category)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default() += weight;
    }

    /// 按指纹类型分发一条命中结果
    pub fn record(&mut self, result: &MatchResult) {
        let fp = &result.fingerprint;
        let version = result.output.as_version();
        if fp.is_md5() {
            self.add_md5(&result.response.url, fp.category, &fp.name, version);
        } else {
            self.add_direct(fp.category, &fp.name, version, result.weight);
        }
    }

    /// 某分类下已记录的软件名
    pub fn names(&self, category: Category) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .scores
            .get(&category)
            .map(|by_name| by_name.keys().cloned().collect())
            .unwrap_or_default();
        for entries in self.md5_ledger.values() {
            names.extend(entries.keys().filter(|(c, _)| *c == category).map(|(_, n)| n.clone()));
        }
        names
    }

    /// 当前得分快照（含 md5 账本折算），只读，不改变内部状态
    ///
    /// 同一URL下同一软件观察到 n 个不同版本时，每个版本得 1/n
    pub fn snapshot(&self) -> ScoreTable {
        let mut table = self.scores.clone();
        for entries in self.md5_ledger.values() {
            for ((category, name), versions) in entries {
                let distinct: BTreeSet<&String> = versions.iter().collect();
                let share = 1.0 / distinct.len() as f64;
                let by_version = table.entry(*category).or_default().entry(name.clone()).or_default();
                for version in distinct {
                    *by_version.entry(version.clone()).or_default() += share;
                }
            }
        }
        table
    }

    /// 计算最终排名
    pub fn finalize(&self) -> RankedResults {
        let mut ranked = RankedResults::default();
        for (category, by_name) in self.snapshot() {
            for (name, by_version) in by_name {
                let leaders = Self::leaders(&by_version);
                ranked.entries.entry(category).or_default().insert(name, leaders);
            }
        }
        ranked
    }

    /// 权重最高的版本（并列全部保留）；空占位与非空版本并列时排到后面
    fn leaders(by_version: &BTreeMap<String, f64>) -> Vec<String> {
        let max = by_version.values().copied().fold(f64::MIN, f64::max);
        let (mut named, blank): (Vec<String>, Vec<String>) = by_version
            .iter()
            .filter(|(_, weight)| (max - **weight).abs() < WEIGHT_EPSILON)
            .map(|(version, _)| version.clone())
            .partition(|version| !version.is_empty());
        named.extend(blank);
        named
    }
}

/// 排名结果：分类 -> 软件名 -> 版本列表（权重并列第一的全部版本）
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RankedResults {
    entries: BTreeMap<Category, BTreeMap<String, Vec<String>>>,
}

impl RankedResults {
    pub fn get(&self, category: Category, name: &str) -> Option<&[String]> {
        self.entries.get(&category)?.get(name).map(Vec::as_slice)
    }

    pub fn category(&self, category: Category) -> Option<&BTreeMap<String, Vec<String>>> {
        self.entries.get(&category)
    }

    pub fn names(&self, category: Category) -> Vec<&str> {
        self.entries
            .get(&category)
            .map(|by_name| by_name.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &BTreeMap<String, Vec<String>>)> {
        self.entries.iter()
    }
}

impl fmt::Display for RankedResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (category, by_name) in &self.entries {
            let line: Vec<String> = by_name
                .iter()
                .map(|(name, versions)| {
                    let shown: Vec<&str> = versions
                        .iter()
                        .map(String::as_str)
                        .filter(|v| !v.is_empty())
                        .collect();
                    format!("{}: [{}]", name, shown.join(", "))
                })
                .collect();
            writeln!(f, "{:<20}{}", category.as_str(), line.join(", "))?;
        }
        Ok(())
    }
}
