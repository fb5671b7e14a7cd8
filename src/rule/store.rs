//! 指纹库索引
//! 加载后只读：按分类、按软件名、无URL指纹视图，以及CMS发现用的广度优先队列

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::loader::{LoadedData, RuleLoader};
use super::model::{Dictionary, OsFingerprint};
use crate::compiler::{Category, Fingerprint, FingerprintGroup};

/// 指纹库
#[derive(Debug, Default)]
pub struct FingerprintStore {
    by_category: HashMap<Category, Vec<Arc<Fingerprint>>>,
    url_less: HashMap<Category, Vec<Arc<Fingerprint>>>,
    by_name: HashMap<String, Vec<Arc<Fingerprint>>>,
    interesting: Vec<Arc<Fingerprint>>,
    error_pages: Vec<String>,
    os: Vec<OsFingerprint>,
    dictionary: Dictionary,
}

impl FingerprintStore {
    /// 从指纹库目录加载
    pub fn load(data_dir: &Path) -> Self {
        Self::from_loaded(RuleLoader::load(data_dir))
    }

    pub fn from_loaded(data: LoadedData) -> Self {
        let mut store = Self::from_fingerprints(data.fingerprints);
        store.interesting = data.interesting.into_iter().map(Arc::new).collect();
        store.error_pages = data.error_pages;
        store.os = data.os;
        store.dictionary = data.dictionary;
        store
    }

    /// 由内存中的指纹构建索引（保持输入顺序）
    pub fn from_fingerprints(fingerprints: Vec<Fingerprint>) -> Self {
        let mut store = Self::default();
        for fp in fingerprints {
            let fp = Arc::new(fp);
            if fp.url.is_none() {
                store.url_less.entry(fp.category).or_default().push(fp.clone());
            }
            store.by_name.entry(fp.name.clone()).or_default().push(fp.clone());
            store.by_category.entry(fp.category).or_default().push(fp);
        }
        store
    }

    pub fn with_error_pages(mut self, error_pages: Vec<String>) -> Self {
        self.error_pages = error_pages;
        self
    }

    pub fn with_interesting(mut self, interesting: Vec<Fingerprint>) -> Self {
        self.interesting = interesting.into_iter().map(Arc::new).collect();
        self
    }

    pub fn with_os(mut self, os: Vec<OsFingerprint>) -> Self {
        self.os = os;
        self
    }

    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn by_category(&self, category: Category) -> &[Arc<Fingerprint>] {
        self.by_category.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 无URL的指纹（事后匹配缓存中的响应，不主动请求）
    pub fn url_less(&self, category: Category) -> &[Arc<Fingerprint>] {
        self.url_less.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_name(&self, name: &str) -> &[Arc<Fingerprint>] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn interesting(&self) -> &[Arc<Fingerprint>] {
        &self.interesting
    }

    pub fn error_pages(&self) -> &[String] {
        &self.error_pages
    }

    pub fn os(&self) -> &[OsFingerprint] {
        &self.os
    }

    /// 按小写键翻译软件名（Server 头中的包名）
    pub fn translate(&self, pkg: &str) -> Option<&str> {
        self.dictionary.get(pkg).map(|entry| entry.name.as_str())
    }

    /// 按URL分组（首次出现顺序），仅含有URL的指纹
    pub fn group_by_url(fingerprints: &[Arc<Fingerprint>]) -> Vec<FingerprintGroup> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Arc<Fingerprint>>> = HashMap::new();
        for fp in fingerprints {
            let Some(url) = &fp.url else {
                continue;
            };
            let entry = groups.entry(url.clone()).or_insert_with(|| {
                order.push(url.clone());
                Vec::new()
            });
            entry.push(fp.clone());
        }
        order
            .into_iter()
            .filter_map(|url| groups.remove(&url).map(|fps| FingerprintGroup::new(url, fps)))
            .collect()
    }

    /// CMS发现用的广度优先队列
    ///
    /// 1. 按CMS名（首次出现顺序）收集各自去重后的URL列表，构成矩阵的行
    /// 2. 按列展开：依次取每行第0个、第1个……，已取完的行跳过
    /// 3. 每个URL重新展开为所有CMS中共享该URL的指纹，一次请求验证多条签名
    pub fn ordered_cms_queue(&self) -> Vec<FingerprintGroup> {
        let cms = self.by_category(Category::Cms);

        let mut names: Vec<&str> = Vec::new();
        let mut rows: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut seen_per_name: HashSet<(&str, &str)> = HashSet::new();
        for fp in cms {
            let Some(url) = fp.url.as_deref() else {
                continue;
            };
            let name = fp.name.as_str();
            let row = rows.entry(name).or_insert_with(|| {
                names.push(name);
                Vec::new()
            });
            if seen_per_name.insert((name, url)) {
                row.push(url);
            }
        }

        let longest = rows.values().map(Vec::len).max().unwrap_or(0);
        let mut flattened: Vec<&str> = Vec::new();
        let mut seen_urls: HashSet<&str> = HashSet::new();
        for column in 0..longest {
            for name in &names {
                if let Some(&url) = rows[name].get(column) {
                    if seen_urls.insert(url) {
                        flattened.push(url);
                    }
                }
            }
        }

        let mut by_url: HashMap<&str, Vec<Arc<Fingerprint>>> = HashMap::new();
        for fp in cms {
            if let Some(url) = fp.url.as_deref() {
                by_url.entry(url).or_default().push(fp.clone());
            }
        }

        flattened
            .into_iter()
            .filter_map(|url| by_url.remove(url).map(|fps| FingerprintGroup::new(url, fps)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ExpectedCode, MatchRule};

    fn cms(name: &str, url: Option<&str>) -> Fingerprint {
        Fingerprint {
            name: name.to_string(),
            category: Category::Cms,
            url: url.map(str::to_string),
            rule: MatchRule::String(name.to_string()),
            output: None,
            code: ExpectedCode::Ok,
            weight: 1.0,
            note: None,
            show_all_detections: true,
        }
    }

    fn owners(group: &FingerprintGroup) -> HashSet<String> {
        group.fingerprints.iter().map(|fp| fp.name.clone()).collect()
    }

    #[test]
    fn test_ordered_queue_is_breadth_first() {
        let store = FingerprintStore::from_fingerprints(vec![
            cms("A", Some("/a1")),
            cms("A", Some("/a2")),
            cms("A", Some("/a3")),
            cms("B", Some("/b1")),
            cms("B", Some("/b2")),
            cms("C", Some("/c1")),
        ]);
        let urls: Vec<String> = store.ordered_cms_queue().into_iter().map(|g| g.url).collect();
        assert_eq!(urls, vec!["/a1", "/b1", "/c1", "/a2", "/b2", "/a3"]);
    }

    #[test]
    fn test_ordered_queue_never_repeats_cms_while_others_remain() {
        let mut fps = Vec::new();
        for i in 0..5 {
            fps.push(cms("Joomla", Some(&format!("/j{}", i))));
        }
        for i in 0..3 {
            fps.push(cms("Drupal", Some(&format!("/d{}", i))));
        }
        fps.push(cms("Plone", Some("/p0")));
        let store = FingerprintStore::from_fingerprints(fps);
        let queue = store.ordered_cms_queue();

        let total_per_name = |name: &str| store.by_name(name).len();
        let mut consumed: HashMap<String, usize> = HashMap::new();
        let mut previous: Option<HashSet<String>> = None;
        for group in &queue {
            let current = owners(group);
            if let Some(prev) = &previous {
                if prev == &current {
                    let others_remaining = ["Joomla", "Drupal", "Plone"]
                        .iter()
                        .filter(|n| !current.contains(**n))
                        .any(|n| consumed.get(*n).copied().unwrap_or(0) < total_per_name(*n));
                    assert!(!others_remaining, "同一CMS连续出现：{}", group.url);
                }
            }
            for name in &current {
                *consumed.entry(name.clone()).or_default() += 1;
            }
            previous = Some(current);
        }
        assert_eq!(queue.len(), 9);
    }

    #[test]
    fn test_shared_url_expands_to_all_owners() {
        let store = FingerprintStore::from_fingerprints(vec![
            cms("A", Some("/robots.txt")),
            cms("B", Some("/b1")),
            cms("B", Some("/robots.txt")),
        ]);
        let queue = store.ordered_cms_queue();
        assert_eq!(queue[0].url, "/robots.txt");
        assert_eq!(owners(&queue[0]).len(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_url_less_view() {
        let store = FingerprintStore::from_fingerprints(vec![cms("A", None), cms("A", Some("/a"))]);
        assert_eq!(store.url_less(Category::Cms).len(), 1);
        assert_eq!(store.by_category(Category::Cms).len(), 2);
        assert_eq!(store.ordered_cms_queue().len(), 1);
    }
}
