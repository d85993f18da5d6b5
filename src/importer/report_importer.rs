// ==========================================
// 诊所账单报表导入系统 - 报表导入器实现
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解析 → 诊所身份 → 逐分类 Upsert → 导入历史
// 红线: 解析失败时不触碰任何存储
//       Upsert 失败为硬错误；导入历史失败仅告警
// ==========================================

use crate::domain::import::{ImportHistoryEntry, ImportSummary};
use crate::domain::types::Category;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::parse_engine::ParseEngine;
use crate::importer::report_importer_trait::ReportImporter;
use crate::repository::{ClinicRepository, ImportHistoryRepository, ReportUpsertRepository};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// ReportImporterImpl - 报表导入器实现
// ==========================================
pub struct ReportImporterImpl<C, U, H>
where
    C: ClinicRepository,
    U: ReportUpsertRepository,
    H: ImportHistoryRepository,
{
    // 数据访问层
    clinic_repo: C,
    report_repo: U,
    history_repo: H,

    // 解析引擎
    engine: ParseEngine,
}

impl<C, U, H> ReportImporterImpl<C, U, H>
where
    C: ClinicRepository,
    U: ReportUpsertRepository,
    H: ImportHistoryRepository,
{
    /// 创建新的 ReportImporter 实例
    ///
    /// # 参数
    /// - clinic_repo: 诊所身份仓储
    /// - report_repo: 分类记录 Upsert 仓储
    /// - history_repo: 导入历史仓储
    pub fn new(clinic_repo: C, report_repo: U, history_repo: H) -> Self {
        Self {
            clinic_repo,
            report_repo,
            history_repo,
            engine: ParseEngine::new(),
        }
    }

    pub fn engine(&self) -> &ParseEngine {
        &self.engine
    }
}

#[async_trait]
impl<C, U, H> ReportImporter for ReportImporterImpl<C, U, H>
where
    C: ClinicRepository,
    U: ReportUpsertRepository,
    H: ImportHistoryRepository,
{
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn import_from_bytes(&self, bytes: &[u8], file_name: &str) -> ImportResult<ImportSummary> {
        let start_time = Instant::now();
        info!("开始导入报表");

        // === 步骤 1: 解析 ===
        let (parsed, diagnostics) = self
            .engine
            .parse_bytes_with_diagnostics(bytes, file_name)
            .map_err(|e| {
                warn!(error = %e, "报表解析失败");
                ImportError::from(e)
            })?;

        // === 步骤 2: 诊所身份 ===
        let clinica = parsed.estabelecimento.clone();
        let clinica_id = self
            .clinic_repo
            .get_or_create(&clinica.cnpj, clinica.external_id.as_deref())
            .await
            .map_err(|e| {
                error!(cnpj = %clinica.cnpj, error = %e, "诊所身份解析失败");
                ImportError::ClinicResolution(e)
            })?;
        debug!(cnpj = %clinica.cnpj, clinica_id = %clinica_id, "诊所身份已确定");

        // === 步骤 3: 逐分类 Upsert ===
        let mut registros = BTreeMap::new();
        for category in Category::ALL {
            let records = parsed.records(category);
            registros.insert(category, records.len());
            if records.is_empty() {
                continue;
            }

            self.report_repo
                .upsert(category, &clinica_id, &records, category.conflict_key())
                .await
                .map_err(|source| {
                    error!(category = %category, error = %source, "分类记录写入失败");
                    ImportError::Upsert { category, source }
                })?;
        }

        // === 步骤 4: 导入历史 ===
        let entry = ImportHistoryEntry::completed(
            &clinica_id,
            file_name,
            &registros,
            diagnostics.unrecognized_count(),
        );
        if let Err(e) = self.history_repo.record(&entry).await {
            warn!(clinica_id = %clinica_id, error = %e, "导入历史写入失败，已忽略");
        }

        let summary = ImportSummary {
            clinica,
            clinica_id,
            registros,
        };

        info!(
            clinica_id = %summary.clinica_id,
            total = summary.total_records(),
            unrecognized_blocks = diagnostics.unrecognized_count(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "报表导入完成"
        );

        Ok(summary)
    }

    async fn import_from_file<P: AsRef<Path> + Send>(&self, file_path: P) -> ImportResult<ImportSummary> {
        let path = file_path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            error!(file = %path.display(), error = %e, "文件读取失败");
            ImportError::FileRead(format!("{}: {}", path.display(), e))
        })?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        self.import_from_bytes(&bytes, file_name).await
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> Vec<ImportResult<ImportSummary>> {
        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| async move {
            let path_str = path.as_ref().display().to_string();
            let result = self.import_from_file(path).await;
            match &result {
                Ok(summary) => info!(file = %path_str, total = summary.total_records(), "文件导入成功"),
                Err(e) => error!(file = %path_str, error = %e, "文件导入失败"),
            }
            result
        });

        // 并发执行所有导入任务
        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}
