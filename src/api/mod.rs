// ==========================================
// 诊所账单报表导入系统 - API 层
// ==========================================
// 职责: 提供上传导入接口,供命令行入口调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, StatusResponse};
