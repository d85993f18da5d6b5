// ==========================================
// ReportImporter 集成测试
// ==========================================
// 测试目标: 解析 → 诊所身份 → Upsert → 导入历史 的完整流程
// 覆盖: SQLite 实现 + 失败协作方（mock）
// ==========================================


use async_trait::async_trait;
use clinic_billing_import::domain::{Category, ImportHistoryEntry, NormalizedRecord};
use clinic_billing_import::importer::{ImportError, ReportImporter, ReportImporterImpl};
use clinic_billing_import::logging;
use clinic_billing_import::repository::{
    ClinicEntity, ClinicRepository, ImportHistoryRepository, RepositoryError, RepositoryResult,
    ReportUpsertRepository, SqliteClinicRepository, SqliteImportHistoryRepository,
    SqliteReportRepository,
};
use std::sync::{Arc, Mutex};
use test_helpers::{
    count_rows, create_test_db, report_without_identity_csv, sample_report_csv,
    sample_report_xlsx, write_file, TEST_CNPJ,
};

type SqliteImporter =
    ReportImporterImpl<SqliteClinicRepository, SqliteReportRepository, SqliteImportHistoryRepository>;

/// 创建测试用的 ReportImporter 实例
fn create_test_importer(db_path: &str) -> SqliteImporter {
    ReportImporterImpl::new(
        SqliteClinicRepository::new(db_path).expect("Failed to create ClinicRepository"),
        SqliteReportRepository::new(db_path).expect("Failed to create ReportRepository"),
        SqliteImportHistoryRepository::new(db_path).expect("Failed to create HistoryRepository"),
    )
}

// ==========================================
// Mock 协作方
// ==========================================

/// 固定返回同一诊所 ID
struct FixedClinicRepository;

#[async_trait]
impl ClinicRepository for FixedClinicRepository {
    async fn get_or_create(&self, _cnpj: &str, _external_id: Option<&str>) -> RepositoryResult<String> {
        Ok("clinica-fixa".to_string())
    }

    async fn find_by_cnpj(&self, _cnpj: &str) -> RepositoryResult<Option<ClinicEntity>> {
        Ok(None)
    }
}

/// 身份解析总是失败
struct FailingClinicRepository;

#[async_trait]
impl ClinicRepository for FailingClinicRepository {
    async fn get_or_create(&self, _cnpj: &str, _external_id: Option<&str>) -> RepositoryResult<String> {
        Err(RepositoryError::DatabaseConnectionError("offline".to_string()))
    }

    async fn find_by_cnpj(&self, _cnpj: &str) -> RepositoryResult<Option<ClinicEntity>> {
        Err(RepositoryError::DatabaseConnectionError("offline".to_string()))
    }
}

type UpsertCall = (Category, String, usize, Vec<String>);

/// 记录每次 Upsert 调用（分类、诊所、行数、冲突键）
#[derive(Default)]
struct RecordingUpsertRepository {
    calls: Arc<Mutex<Vec<UpsertCall>>>,
    fail_on: Option<Category>,
}

#[async_trait]
impl ReportUpsertRepository for RecordingUpsertRepository {
    async fn upsert(
        &self,
        category: Category,
        clinica_id: &str,
        records: &[NormalizedRecord],
        conflict_key: &[&str],
    ) -> RepositoryResult<usize> {
        if self.fail_on == Some(category) {
            return Err(RepositoryError::DatabaseQueryError("disk full".to_string()));
        }
        self.calls.lock().unwrap().push((
            category,
            clinica_id.to_string(),
            records.len(),
            conflict_key.iter().map(|c| c.to_string()).collect(),
        ));
        Ok(records.len())
    }

    async fn count(&self, _category: Category, _clinica_id: &str) -> RepositoryResult<usize> {
        Ok(0)
    }
}

/// 记录导入历史；可配置为总是失败
#[derive(Default)]
struct MemoryHistoryRepository {
    entries: Mutex<Vec<ImportHistoryEntry>>,
    fail: bool,
}

#[async_trait]
impl ImportHistoryRepository for MemoryHistoryRepository {
    async fn record(&self, entry: &ImportHistoryEntry) -> RepositoryResult<()> {
        if self.fail {
            return Err(RepositoryError::DatabaseQueryError("importacoes indisponível".to_string()));
        }
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_by_clinic(&self, clinica_id: &str) -> RepositoryResult<Vec<ImportHistoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.clinica_id == clinica_id)
            .cloned()
            .collect())
    }
}

// ==========================================
// SQLite 端到端
// ==========================================

#[tokio::test]
async fn test_import_persists_records_and_history() {
    logging::init_test();

    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let importer = create_test_importer(&db_path);

    let summary = importer
        .import_from_bytes(&sample_report_xlsx(), "relatorio.xlsx")
        .await
        .expect("导入应成功");

    assert_eq!(summary.clinica.cnpj, TEST_CNPJ);
    assert_eq!(summary.registros.len(), Category::ALL.len());
    assert_eq!(summary.registros[&Category::TaxaAtrasoFaixa], 2);
    assert_eq!(summary.registros[&Category::Inadimplencia], 1);
    assert_eq!(summary.registros[&Category::ParcelamentosDetalhe], 2);
    assert_eq!(summary.registros[&Category::BoletosEmitidos], 0);

    assert_eq!(count_rows(&db_path, "clinicas"), 1);
    assert_eq!(count_rows(&db_path, "taxa_atraso_faixa"), 2);
    assert_eq!(count_rows(&db_path, "parcelamentos_detalhe"), 2);
    assert_eq!(count_rows(&db_path, "importacoes"), 1);

    let history = SqliteImportHistoryRepository::new(&db_path)
        .unwrap()
        .list_by_clinic(&summary.clinica_id)
        .await
        .unwrap();
    assert_eq!(history[0].arquivo_nome, "relatorio.xlsx");
    assert_eq!(history[0].total_linhas, 0);
    assert_eq!(history[0].avisos, 1); // "Observações Gerais"
    assert_eq!(history[0].log, summary.registros);
}

#[tokio::test]
async fn test_reimport_same_file_is_idempotent() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);
    let bytes = sample_report_csv();

    let first = importer
        .import_from_bytes(bytes.as_bytes(), "relatorio.csv")
        .await
        .unwrap();
    let second = importer
        .import_from_bytes(bytes.as_bytes(), "relatorio.csv")
        .await
        .unwrap();

    // 同一 CNPJ 复用诊所；记录按冲突键更新而非重复插入
    assert_eq!(first.clinica_id, second.clinica_id);
    assert_eq!(first.registros, second.registros);
    assert_eq!(count_rows(&db_path, "clinicas"), 1);
    assert_eq!(count_rows(&db_path, "boletos_emitidos"), 2);

    // 每次导入各记一条历史
    assert_eq!(count_rows(&db_path, "importacoes"), 2);
}

#[tokio::test]
async fn test_parse_failure_touches_no_storage() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);

    let err = importer
        .import_from_bytes(report_without_identity_csv().as_bytes(), "relatorio.csv")
        .await
        .unwrap_err();

    assert!(err.is_parse_error());
    assert!(err.is_identity_not_found());
    assert_eq!(count_rows(&db_path, "clinicas"), 0);
    assert_eq!(count_rows(&db_path, "importacoes"), 0);
}

#[tokio::test]
async fn test_import_from_file_and_batch() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let importer = create_test_importer(&db_path);
    let dir = tempfile::tempdir().unwrap();

    let csv_path = write_file(dir.path(), "maio.csv", sample_report_csv().as_bytes());
    let xlsx_path = write_file(dir.path(), "indicadores.xlsx", &sample_report_xlsx());
    let missing = dir.path().join("nao_existe.xlsx");

    let summary = importer.import_from_file(&csv_path).await.unwrap();
    assert_eq!(summary.registros[&Category::BoletosEmitidos], 2);

    let results = importer
        .batch_import(vec![csv_path.clone(), missing, xlsx_path])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ImportError::FileRead(_))));
    assert!(results[2].is_ok());

    // 两个文件属于同一 CNPJ
    assert_eq!(count_rows(&db_path, "clinicas"), 1);
    assert_eq!(count_rows(&db_path, "importacoes"), 3);
}

// ==========================================
// 协作方语义（mock）
// ==========================================

#[tokio::test]
async fn test_upserts_follow_canonical_order_and_skip_empty_categories() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let importer = ReportImporterImpl::new(
        FixedClinicRepository,
        RecordingUpsertRepository {
            calls: Arc::clone(&calls),
            fail_on: None,
        },
        MemoryHistoryRepository::default(),
    );

    let summary = importer
        .import_from_bytes(&sample_report_xlsx(), "relatorio.xlsx")
        .await
        .unwrap();
    assert_eq!(summary.clinica_id, "clinica-fixa");

    let calls = calls.lock().unwrap();
    let categories: Vec<Category> = calls.iter().map(|(c, _, _, _)| *c).collect();
    assert_eq!(
        categories,
        vec![
            Category::TaxaAtrasoFaixa,
            Category::Inadimplencia,
            Category::ParcelamentosDetalhe,
        ]
    );

    for (category, clinica_id, rows, conflict_key) in calls.iter() {
        assert_eq!(clinica_id, "clinica-fixa");
        assert_eq!(*rows, summary.registros[category]);
        assert_eq!(conflict_key, category.conflict_key());
    }
}

#[tokio::test]
async fn test_upsert_failure_is_a_hard_error() {
    let importer = ReportImporterImpl::new(
        FixedClinicRepository,
        RecordingUpsertRepository {
            fail_on: Some(Category::Inadimplencia),
            ..Default::default()
        },
        MemoryHistoryRepository::default(),
    );

    let err = importer
        .import_from_bytes(&sample_report_xlsx(), "relatorio.xlsx")
        .await
        .unwrap_err();

    assert!(!err.is_parse_error());
    assert!(matches!(
        err,
        ImportError::Upsert {
            category: Category::Inadimplencia,
            ..
        }
    ));
}

#[tokio::test]
async fn test_history_failure_is_not_fatal() {
    let importer = ReportImporterImpl::new(
        FixedClinicRepository,
        RecordingUpsertRepository::default(),
        MemoryHistoryRepository {
            fail: true,
            ..Default::default()
        },
    );

    let summary = importer
        .import_from_bytes(sample_report_csv().as_bytes(), "relatorio.csv")
        .await
        .expect("导入历史失败不应影响导入结果");

    assert_eq!(summary.registros[&Category::BoletosEmitidos], 2);
}

#[tokio::test]
async fn test_clinic_resolution_failure() {
    let importer = ReportImporterImpl::new(
        FailingClinicRepository,
        RecordingUpsertRepository::default(),
        MemoryHistoryRepository::default(),
    );

    let err = importer
        .import_from_bytes(sample_report_csv().as_bytes(), "relatorio.csv")
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::ClinicResolution(_)));
}
