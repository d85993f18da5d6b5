// ==========================================
// 诊所账单报表导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有取值使用参数化；表名/列名仅来自 Category 元数据
// ==========================================

pub mod clinic_repo;
pub mod error;
pub mod import_history_repo;
pub mod report_repo;

// 重导出核心仓储
pub use clinic_repo::{ClinicEntity, ClinicRepository, SqliteClinicRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use import_history_repo::{ImportHistoryRepository, SqliteImportHistoryRepository};
pub use report_repo::{ReportUpsertRepository, SqliteReportRepository};
