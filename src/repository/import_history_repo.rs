// ==========================================
// 诊所账单报表导入系统 - 导入历史仓储
// ==========================================
// 职责: importacoes 表读写（每次成功导入一条）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::{ImportHistoryEntry, ImportStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ImportHistoryRepository Trait
// ==========================================
// 用途: 导入历史协作方
// 实现者: SqliteImportHistoryRepository
#[async_trait]
pub trait ImportHistoryRepository: Send + Sync {
    /// 写入一条导入历史
    async fn record(&self, entry: &ImportHistoryEntry) -> RepositoryResult<()>;

    /// 按诊所查询历史（新 → 旧）
    async fn list_by_clinic(&self, clinica_id: &str) -> RepositoryResult<Vec<ImportHistoryEntry>>;
}

// ==========================================
// SqliteImportHistoryRepository
// ==========================================
pub struct SqliteImportHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteImportHistoryRepository {
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

/// 数据库行（status/log/created_at 仍为原始文本）
struct HistoryRow {
    id: String,
    clinica_id: String,
    arquivo_nome: String,
    total_linhas: i64,
    erros: i64,
    avisos: i64,
    status: String,
    log: String,
    created_at: String,
}

impl HistoryRow {
    fn into_entry(self) -> RepositoryResult<ImportHistoryEntry> {
        let status = ImportStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::SerializationError(format!("未知导入状态: {}", self.status))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?
            .with_timezone(&Utc);

        Ok(ImportHistoryEntry {
            id: self.id,
            clinica_id: self.clinica_id,
            arquivo_nome: self.arquivo_nome,
            total_linhas: self.total_linhas,
            erros: self.erros,
            avisos: self.avisos,
            status,
            log: serde_json::from_str(&self.log)?,
            created_at,
        })
    }
}

#[async_trait]
impl ImportHistoryRepository for SqliteImportHistoryRepository {
    async fn record(&self, entry: &ImportHistoryEntry) -> RepositoryResult<()> {
        let log = serde_json::to_string(&entry.log)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO importacoes (
                id, clinica_id, arquivo_nome, total_linhas, erros, avisos,
                status, log, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entry.id,
                entry.clinica_id,
                entry.arquivo_nome,
                entry.total_linhas,
                entry.erros,
                entry.avisos,
                entry.status.as_str(),
                log,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn list_by_clinic(&self, clinica_id: &str) -> RepositoryResult<Vec<ImportHistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, clinica_id, arquivo_nome, total_linhas, erros, avisos,
                   status, log, created_at
            FROM importacoes
            WHERE clinica_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![clinica_id], |row| {
                Ok(HistoryRow {
                    id: row.get(0)?,
                    clinica_id: row.get(1)?,
                    arquivo_nome: row.get(2)?,
                    total_linhas: row.get(3)?,
                    erros: row.get(4)?,
                    avisos: row.get(5)?,
                    status: row.get(6)?,
                    log: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(HistoryRow::into_entry).collect()
    }
}
