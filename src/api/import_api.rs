// ==========================================
// 诊所账单报表导入系统 - 上传导入 API
// ==========================================
// 职责: 封装上传入口（文件/字节 → 导入结果响应）
// 响应: {"status":"ok", clinica, clinica_id, registros}
//       {"status":"error", "detail": 错误消息}
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::AppConfig;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::import::{ImportHistoryEntry, ImportSummary};
use crate::domain::report::ParseResult;
use crate::importer::{ImportResult, ReportImporter, ReportImporterImpl, Workbook};
use crate::repository::{
    ClinicRepository, ImportHistoryRepository, SqliteClinicRepository,
    SqliteImportHistoryRepository, SqliteReportRepository,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

type SqliteReportImporter =
    ReportImporterImpl<SqliteClinicRepository, SqliteReportRepository, SqliteImportHistoryRepository>;

/// 上传导入响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportApiResponse {
    /// 导入成功（字段与 ImportSummary 平铺）
    Ok(ImportSummary),
    /// 导入失败
    Error { detail: String },
}

impl ImportApiResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, ImportApiResponse::Ok(_))
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        match self {
            ImportApiResponse::Ok(summary) => Some(summary),
            ImportApiResponse::Error { .. } => None,
        }
    }
}

impl From<ImportResult<ImportSummary>> for ImportApiResponse {
    fn from(result: ImportResult<ImportSummary>) -> Self {
        match result {
            Ok(summary) => ImportApiResponse::Ok(summary),
            Err(e) => ImportApiResponse::Error {
                detail: e.to_string(),
            },
        }
    }
}

/// 服务状态响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// 上传导入 API
pub struct ImportApi {
    config: AppConfig,
    importer: SqliteReportImporter,
    clinic_repo: SqliteClinicRepository,
    history_repo: SqliteImportHistoryRepository,
}

impl ImportApi {
    /// 创建新的 ImportApi 实例
    ///
    /// 打开（必要时初始化）配置指定的数据库，各仓储共享同一连接
    pub fn new(config: AppConfig) -> ApiResult<Self> {
        let conn = open_sqlite_connection(&config.db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", config.db_path, e)))?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let importer = ReportImporterImpl::new(
            SqliteClinicRepository::from_connection(conn.clone()),
            SqliteReportRepository::from_connection(conn.clone()),
            SqliteImportHistoryRepository::from_connection(conn.clone()),
        );

        info!(db_path = %config.db_path, "ImportApi 初始化完成");

        Ok(Self {
            config,
            importer,
            clinic_repo: SqliteClinicRepository::from_connection(conn.clone()),
            history_repo: SqliteImportHistoryRepository::from_connection(conn),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 服务状态
    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            status: "online".to_string(),
            version: crate::VERSION.to_string(),
        }
    }

    /// 导入磁盘文件
    pub async fn import_file(&self, file_path: &str) -> ImportApiResponse {
        let response: ImportApiResponse = self.importer.import_from_file(file_path).await.into();
        if let ImportApiResponse::Error { detail } = &response {
            warn!(file = %file_path, detail = %detail, "上传导入失败");
        }
        response
    }

    /// 导入上传内容
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（缺省时使用配置中的默认文件名）
    pub async fn import_bytes(&self, bytes: &[u8], file_name: Option<&str>) -> ImportApiResponse {
        let file_name = file_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.config.default_file_name.as_str());

        let response: ImportApiResponse = self.importer.import_from_bytes(bytes, file_name).await.into();
        if let ImportApiResponse::Error { detail } = &response {
            warn!(file = %file_name, detail = %detail, "上传导入失败");
        }
        response
    }

    /// 批量导入多个文件（每个文件独立响应）
    pub async fn import_files(&self, file_paths: &[String]) -> Vec<ImportApiResponse> {
        self.importer
            .batch_import(file_paths.to_vec())
            .await
            .into_iter()
            .map(ImportApiResponse::from)
            .collect()
    }

    /// 仅解析，不落库
    pub fn parse_only<P: AsRef<Path>>(&self, file_path: P) -> ApiResult<ParseResult> {
        let workbook = Workbook::open(file_path)?;
        Ok(self.importer.engine().parse(&workbook)?)
    }

    /// 按 CNPJ 查询导入历史（新 → 旧）
    pub async fn history(&self, cnpj: &str) -> ApiResult<Vec<ImportHistoryEntry>> {
        let clinic = self
            .clinic_repo
            .find_by_cnpj(cnpj.trim())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("CNPJ {} 对应的诊所", cnpj.trim())))?;

        Ok(self.history_repo.list_by_clinic(&clinic.id).await?)
    }
}
