// ==========================================
// 诊所账单报表导入系统 - 配置层
// ==========================================
// 职责: 应用配置（数据库路径、日志格式）
// ==========================================

pub mod app_config;

// 重导出核心配置
pub use app_config::{get_default_db_path, AppConfig, LogFormat, ENV_DB_PATH, ENV_LOG_FORMAT};
