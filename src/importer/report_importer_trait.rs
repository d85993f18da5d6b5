// ==========================================
// 诊所账单报表导入系统 - 报表导入 Trait
// ==========================================
// 职责: 定义报表导入接口（不包含实现）
// ==========================================

use crate::domain::import::ImportSummary;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// ReportImporter Trait
// ==========================================
// 用途: 报表导入主接口
// 实现者: ReportImporterImpl
#[async_trait]
pub trait ReportImporter: Send + Sync {
    /// 从上传的文件内容导入
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（写入导入历史，并用于识别 CSV）
    ///
    /// # 返回
    /// - Ok(ImportSummary): 诊所身份、诊所 ID、各分类记录数
    /// - Err(ImportError::Parse): 文件无法解析或缺少 CNPJ（未写入任何数据）
    /// - Err(ImportError::ClinicResolution / Upsert): 下游写入失败
    ///
    /// # 导入流程
    /// 1. 解析（ParseEngine）
    /// 2. 解析诊所身份（获取或创建）
    /// 3. 按规范顺序逐分类 Upsert（空分类跳过）
    /// 4. 写入导入历史（失败仅告警）
    async fn import_from_bytes(&self, bytes: &[u8], file_name: &str) -> ImportResult<ImportSummary>;

    /// 从磁盘文件导入
    async fn import_from_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportSummary>;

    /// 批量导入多个文件（并发执行）
    ///
    /// 每个文件的导入相互独立，某个文件失败不影响其他文件
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Vec<ImportResult<ImportSummary>>;
}
