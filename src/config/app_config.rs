// ==========================================
// 诊所账单报表导入系统 - 应用配置
// ==========================================
// 职责: 数据库路径、默认文件名、日志格式
// 来源: 显式构造（AppConfig::new）或环境变量（AppConfig::from_env）
// 约定: 配置值在构造协作方时传入，不使用全局状态
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 数据库路径环境变量
pub const ENV_DB_PATH: &str = "CLINIC_IMPORT_DB_PATH";

/// 日志格式环境变量（text / json）
pub const ENV_LOG_FORMAT: &str = "CLINIC_IMPORT_LOG_FORMAT";

/// 上传内容未带文件名时使用的名称
pub const DEFAULT_FILE_NAME: &str = "arquivo.xlsx";

const DB_FILE_NAME: &str = "clinic_billing_import.db";

// ==========================================
// LogFormat - 日志输出格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("未知日志格式: {}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

// ==========================================
// AppConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub default_file_name: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            default_file_name: DEFAULT_FILE_NAME.to_string(),
            log_format: LogFormat::default(),
        }
    }

    /// 从环境变量读取（缺省值: 用户数据目录下的数据库、文本日志）
    pub fn from_env() -> Self {
        let log_format = std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self {
            log_format,
            ..Self::new(get_default_db_path())
        }
    }
}

/// 获取默认数据库路径
///
/// 优先使用 CLINIC_IMPORT_DB_PATH；否则放在用户数据目录下
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DB_FILE_NAME);

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("clinic-billing-import");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
