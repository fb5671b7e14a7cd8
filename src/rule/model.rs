//! 指纹数据模型定义
//! 仅描述指纹文件的原始结构，支持反序列化

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// 状态码字段：数字或 "any"
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawCode {
    Number(u16),
    Text(String),
}

/// 原始指纹记录（从指纹 JSON 解析）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawFingerprint {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub code: Option<RawCode>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub show_all_detections: Option<bool>,
}

/// interesting.json 记录
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawInteresting {
    pub url: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub ext: Option<Vec<String>>,
    #[serde(default)]
    pub code: Option<RawCode>,
}

/// error_pages.json 记录
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawErrorPage {
    pub url: String,
}

/// os_version 字段：单个或列表
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// 操作系统包指纹（os/*.json）
#[derive(Debug, Clone, Deserialize)]
pub struct RawOsFingerprint {
    pub pkg_name: String,
    pub pkg_version: String,
    pub os_name: String,
    pub os_version: OneOrMany,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// 规范化后的操作系统指纹
#[derive(Debug, Clone, PartialEq)]
pub struct OsFingerprint {
    pub pkg_name: String,
    pub pkg_version: String,
    pub os_name: String,
    pub os_versions: Vec<String>,
    pub weight: f64,
}

impl From<RawOsFingerprint> for OsFingerprint {
    fn from(raw: RawOsFingerprint) -> Self {
        Self {
            pkg_name: raw.pkg_name,
            pkg_version: raw.pkg_version,
            os_name: raw.os_name,
            os_versions: raw.os_version.into_vec(),
            weight: raw.weight.unwrap_or(1.0),
        }
    }
}

/// dictionary.json 条目：文件名 -> 软件名
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DictionaryEntry {
    pub name: String,
    #[serde(default)]
    pub tool: Option<serde_json::Value>,
}

pub type Dictionary = HashMap<String, DictionaryEntry>;
