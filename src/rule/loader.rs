//! 指纹加载管理器
//! 负责从指纹库目录读取全部指纹文件，损坏或无法读取的文件跳过并告警，加载过程不中断

use std::fs;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::model::{Dictionary, OsFingerprint, RawErrorPage, RawFingerprint, RawInteresting, RawOsFingerprint};
use crate::compiler::{Category, Fingerprint, MatchKind, RuleCompiler};
use crate::error::{WigError, WigResult};

/// 主动探测类指纹所在的分类目录
const FINGERPRINT_CATEGORIES: [&str; 3] = ["cms", "platform", "js"];

/// 加载结果
#[derive(Debug, Default)]
pub struct LoadedData {
    pub fingerprints: Vec<Fingerprint>,
    pub interesting: Vec<Fingerprint>,
    pub error_pages: Vec<String>,
    pub os: Vec<OsFingerprint>,
    pub dictionary: Dictionary,
    pub skipped_files: usize,
}

/// 指纹加载管理器
pub struct RuleLoader;

impl RuleLoader {
    /// 从指纹库根目录加载
    pub fn load(data_dir: &Path) -> LoadedData {
        let mut data = LoadedData::default();

        if !data_dir.is_dir() {
            warn!("指纹库目录不存在：{}", data_dir.display());
            return data;
        }

        data.dictionary = Self::read_optional(&data_dir.join("dictionary.json"), &mut data.skipped_files)
            .unwrap_or_default();

        let error_pages: Vec<RawErrorPage> =
            Self::read_optional(&data_dir.join("error_pages.json"), &mut data.skipped_files).unwrap_or_default();
        data.error_pages = error_pages.into_iter().map(|e| e.url).collect();

        let interesting: Vec<RawInteresting> =
            Self::read_optional(&data_dir.join("interesting.json"), &mut data.skipped_files).unwrap_or_default();
        for raw in &interesting {
            match RuleCompiler::compile_interesting(raw) {
                Ok(fps) => data.interesting.extend(fps),
                Err(e) => warn!("interesting 记录无效，已跳过：{}，错误：{}", raw.url, e),
            }
        }

        for file in Self::json_files(&data_dir.join("os")) {
            match Self::read_json::<Vec<RawOsFingerprint>>(&file) {
                Ok(list) => data.os.extend(list.into_iter().map(OsFingerprint::from)),
                Err(e) => {
                    warn!("{}", e);
                    data.skipped_files += 1;
                }
            }
        }

        for category_dir in FINGERPRINT_CATEGORIES {
            let Some(category) = Category::from_dir_name(category_dir) else {
                continue;
            };
            for kind_dir in ["md5", "string", "regex", "header"] {
                let Some(kind) = MatchKind::from_dir_name(kind_dir) else {
                    continue;
                };
                let dir = data_dir.join(category_dir).join(kind_dir);
                for file in Self::json_files(&dir) {
                    match Self::load_fingerprint_file(&file, category, kind, &data.dictionary) {
                        Ok(fps) => data.fingerprints.extend(fps),
                        Err(e) => {
                            warn!("{}", e);
                            data.skipped_files += 1;
                        }
                    }
                }
            }
        }

        debug!(
            "指纹库加载完成：指纹{}条、interesting{}条、错误页路径{}条、OS指纹{}条、跳过文件{}个",
            data.fingerprints.len(),
            data.interesting.len(),
            data.error_pages.len(),
            data.os.len(),
            data.skipped_files
        );

        data
    }

    /// 加载单个指纹文件，文件名（去扩展名）经字典翻译为软件名
    fn load_fingerprint_file(
        path: &Path,
        category: Category,
        kind: MatchKind,
        dictionary: &Dictionary,
    ) -> WigResult<Vec<Fingerprint>> {
        let records: Vec<RawFingerprint> = Self::read_json(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let name = dictionary
            .get(&stem)
            .map(|entry| entry.name.clone())
            .unwrap_or(stem);

        let mut fingerprints = Vec::with_capacity(records.len());
        for raw in &records {
            match RuleCompiler::compile(&name, category, kind, raw) {
                Ok(fp) => fingerprints.push(fp),
                Err(e) => debug!("指纹记录无效，已跳过：{}（{}），错误：{}", name, path.display(), e),
            }
        }
        Ok(fingerprints)
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> WigResult<T> {
        let content = fs::read(path).map_err(|e| WigError::CorruptFingerprintFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&content).map_err(|e| WigError::CorruptFingerprintFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn read_optional<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Option<T> {
        if !path.exists() {
            return None;
        }
        match Self::read_json(path) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{}", e);
                *skipped += 1;
                None
            }
        }
    }

    /// 目录下的 .json 文件（按文件名排序，保证加载顺序可复现）
    fn json_files(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_skips_corrupt_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "dictionary.json", r#"{"wordpress": {"name": "WordPress"}}"#);
        write(root, "cms/md5/wordpress.json", r#"[{"url": "/license.txt", "md5": "aa", "output": "4.9"}]"#);
        write(root, "cms/string/drupal.json", r#"[{"url": "/CHANGELOG.txt", "string": "Drupal""#);
        write(root, "error_pages.json", r#"[{"url": "/does-not-exist-1"}, {"url": "/does-not-exist-2"}]"#);
        write(
            root,
            "os/ubuntu.json",
            r#"[{"pkg_name": "apache", "pkg_version": "2.4.29", "os_name": "Ubuntu", "os_version": "18.04"}]"#,
        );

        let data = RuleLoader::load(root);
        assert_eq!(data.fingerprints.len(), 1);
        assert_eq!(data.fingerprints[0].name, "WordPress");
        assert_eq!(data.skipped_files, 1);
        assert_eq!(data.error_pages.len(), 2);
        assert_eq!(data.os.len(), 1);
    }

    #[test]
    fn test_missing_directory_yields_empty_data() {
        let data = RuleLoader::load(Path::new("/nonexistent/rswig/data"));
        assert!(data.fingerprints.is_empty());
        assert!(data.error_pages.is_empty());
    }
}
