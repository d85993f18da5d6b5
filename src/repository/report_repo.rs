// ==========================================
// 诊所账单报表导入系统 - 分类记录 Upsert 仓储
// ==========================================
// 职责: 归一化记录 → 分类表（按冲突键插入或更新）
// 红线: 每次调用一个事务；冲突时覆盖全部非键列
//       同一文件重复导入不产生重复行
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::report::{FieldValue, NormalizedRecord};
use crate::domain::types::Category;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            FieldValue::Int(i) => Value::Integer(*i),
            FieldValue::Float(f) => Value::Real(*f),
            FieldValue::Text(s) => Value::Text(s.clone()),
            FieldValue::Bool(b) => Value::Integer(*b as i64),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

// ==========================================
// ReportUpsertRepository Trait
// ==========================================
// 用途: 落库协作方
// 实现者: SqliteReportRepository
#[async_trait]
pub trait ReportUpsertRepository: Send + Sync {
    /// 批量 Upsert 某分类的记录
    ///
    /// # 参数
    /// - category: 目标分类（决定表名与列）
    /// - clinica_id: 诊所 ID（写入每一行）
    /// - records: 该分类的归一化记录
    /// - conflict_key: 冲突键列（须为 clinica_id 或该分类的列）
    ///
    /// # 返回
    /// - Ok(usize): 写入行数
    async fn upsert(
        &self,
        category: Category,
        clinica_id: &str,
        records: &[NormalizedRecord],
        conflict_key: &[&str],
    ) -> RepositoryResult<usize>;

    /// 某诊所在某分类表中的行数
    async fn count(&self, category: Category, clinica_id: &str) -> RepositoryResult<usize>;
}

// ==========================================
// SqliteReportRepository
// ==========================================
pub struct SqliteReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReportRepository {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（结构需已由 db::init_schema 初始化）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

/// 校验冲突键: 非空，且每列都属于该分类表
fn validate_conflict_key(category: Category, conflict_key: &[&str]) -> RepositoryResult<()> {
    let invalid = |message: String| RepositoryError::InvalidConflictKey {
        table: category.table_name().to_string(),
        message,
    };

    if conflict_key.is_empty() {
        return Err(invalid("冲突键为空".to_string()));
    }

    for column in conflict_key {
        if *column != "clinica_id" && !category.columns().contains(column) {
            return Err(invalid(format!("未知列 {}", column)));
        }
    }
    Ok(())
}

/// 生成 Upsert 语句
///
/// INSERT INTO t (clinica_id, c1..cn) VALUES (?1..)
/// ON CONFLICT(key) DO UPDATE SET 非键列 = excluded.非键列, updated_at = datetime('now')
fn build_upsert_sql(category: Category, conflict_key: &[&str]) -> String {
    let columns = category.columns();
    let insert_columns: Vec<&str> = std::iter::once("clinica_id")
        .chain(columns.iter().copied())
        .collect();
    let placeholders: Vec<String> = (1..=insert_columns.len())
        .map(|i| format!("?{}", i))
        .collect();

    let mut updates: Vec<String> = insert_columns
        .iter()
        .filter(|c| !conflict_key.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    updates.push("updated_at = datetime('now')".to_string());

    format!(
        "INSERT INTO {table} ({columns}) VALUES ({placeholders}) \
         ON CONFLICT({key}) DO UPDATE SET {updates}",
        table = category.table_name(),
        columns = insert_columns.join(", "),
        placeholders = placeholders.join(", "),
        key = conflict_key.join(", "),
        updates = updates.join(", "),
    )
}

#[async_trait]
impl ReportUpsertRepository for SqliteReportRepository {
    async fn upsert(
        &self,
        category: Category,
        clinica_id: &str,
        records: &[NormalizedRecord],
        conflict_key: &[&str],
    ) -> RepositoryResult<usize> {
        validate_conflict_key(category, conflict_key)?;

        if let Some(mismatch) = records.iter().find(|r| r.category() != category) {
            return Err(RepositoryError::InternalError(format!(
                "记录分类 {} 与目标表 {} 不一致",
                mismatch.category(),
                category
            )));
        }

        let sql = build_upsert_sql(category, conflict_key);
        let clinica = FieldValue::Text(clinica_id.to_string());

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let values = record.values();
                let row = std::iter::once(Some(&clinica)).chain(values.iter().map(Option::as_ref));
                count += stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;

        debug!(table = category.table_name(), clinica_id = %clinica_id, rows = count, "分类记录 Upsert 完成");
        Ok(count)
    }

    async fn count(&self, category: Category, clinica_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE clinica_id = ?1",
            category.table_name()
        );
        let n: i64 = conn.query_row(&sql, params![clinica_id], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::report::{Inadimplencia, TaxaAtrasoFaixa};

    fn setup() -> (Arc<Mutex<Connection>>, SqliteReportRepository) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO clinicas (id, cnpj, created_at) VALUES ('c1', '111', 'now')",
            [],
        )
        .unwrap();
        let shared = Arc::new(Mutex::new(conn));
        let repo = SqliteReportRepository::from_connection(shared.clone());
        (shared, repo)
    }

    fn inad(mes: &str, taxa: f64) -> NormalizedRecord {
        NormalizedRecord::Inadimplencia(Inadimplencia {
            mes_ref: Some(mes.to_string()),
            taxa: Some(taxa),
        })
    }

    #[test]
    fn test_build_upsert_sql() {
        let sql = build_upsert_sql(
            Category::TaxaAtrasoFaixa,
            Category::TaxaAtrasoFaixa.conflict_key(),
        );
        assert!(sql.starts_with(
            "INSERT INTO taxa_atraso_faixa (clinica_id, mes_ref, faixa, qtde, percentual) VALUES (?1, ?2, ?3, ?4, ?5)"
        ));
        assert!(sql.contains("ON CONFLICT(clinica_id, mes_ref, faixa)"));
        assert!(sql.contains("qtde = excluded.qtde"));
        assert!(!sql.contains("faixa = excluded.faixa"));
    }

    #[test]
    fn test_conflict_key_validation() {
        assert!(validate_conflict_key(Category::Inadimplencia, &["clinica_id", "mes_ref"]).is_ok());
        assert!(matches!(
            validate_conflict_key(Category::Inadimplencia, &["faixa"]),
            Err(RepositoryError::InvalidConflictKey { .. })
        ));
        assert!(validate_conflict_key(Category::Inadimplencia, &[]).is_err());
    }

    #[tokio::test]
    async fn test_upsert_updates_on_conflict() {
        let (shared, repo) = setup();
        let key = Category::Inadimplencia.conflict_key();

        repo.upsert(Category::Inadimplencia, "c1", &[inad("2024-05", 0.04), inad("2024-06", 0.05)], key)
            .await
            .unwrap();
        repo.upsert(Category::Inadimplencia, "c1", &[inad("2024-05", 0.07)], key)
            .await
            .unwrap();

        assert_eq!(repo.count(Category::Inadimplencia, "c1").await.unwrap(), 2);
        let taxa: f64 = shared
            .lock()
            .unwrap()
            .query_row(
                "SELECT taxa FROM inadimplencia WHERE clinica_id = 'c1' AND mes_ref = '2024-05'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(taxa, 0.07);
    }

    #[tokio::test]
    async fn test_faixa_is_part_of_key() {
        let (_shared, repo) = setup();
        let record = |faixa: &str| {
            NormalizedRecord::TaxaAtrasoFaixa(TaxaAtrasoFaixa {
                mes_ref: Some("2024-05".to_string()),
                faixa: Some(faixa.to_string()),
                qtde: Some(FieldValue::Int(3)),
                percentual: Some(0.1),
            })
        };

        let written = repo
            .upsert(
                Category::TaxaAtrasoFaixa,
                "c1",
                &[record("0-7"), record("8-15")],
                Category::TaxaAtrasoFaixa.conflict_key(),
            )
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(repo.count(Category::TaxaAtrasoFaixa, "c1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_category_mismatch_rejected() {
        let (_shared, repo) = setup();
        let err = repo
            .upsert(
                Category::BoletosEmitidos,
                "c1",
                &[inad("2024-05", 0.04)],
                Category::BoletosEmitidos.conflict_key(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InternalError(_)));
    }

    #[tokio::test]
    async fn test_unknown_clinic_violates_foreign_key() {
        let (_shared, repo) = setup();
        let err = repo
            .upsert(
                Category::Inadimplencia,
                "nao-existe",
                &[inad("2024-05", 0.04)],
                Category::Inadimplencia.conflict_key(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
