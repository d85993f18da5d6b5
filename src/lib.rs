// ==========================================
// 诊所账单报表导入系统 - 核心库
// ==========================================
// 技术栈: Rust + calamine + SQLite
// 系统定位: 诊所账单报表（多工作表、多数据块）解析、归一化与落库
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 分类与记录
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 解析引擎与导入流程
pub mod importer;

// 配置层 - 应用配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 上传导入接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::Category;

// 领域实体
pub use domain::{IdentityRecord, ImportHistoryEntry, ImportSummary, NormalizedRecord, ParseResult};

// 解析引擎
pub use importer::{parse_excel_from_bytes, ParseDiagnostics, ParseEngine, ReportImporter, ReportImporterImpl};

// API
pub use api::{ImportApi, ImportApiResponse};

// 配置
pub use config::AppConfig;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "诊所账单报表导入系统";
