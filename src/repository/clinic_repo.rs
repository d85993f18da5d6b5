// ==========================================
// 诊所账单报表导入系统 - 诊所身份仓储
// ==========================================
// 职责: CNPJ → 内部诊所 ID（不存在则创建）
// 红线: 同一 CNPJ 只对应一条 clinicas 记录
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// 诊所实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicEntity {
    pub id: String,
    pub cnpj: String,
    pub external_id: Option<String>,
    pub nome: Option<String>, // 初次创建时取 external_id
    pub created_at: String,
}

// ==========================================
// ClinicRepository Trait
// ==========================================
// 用途: 身份解析协作方
// 实现者: SqliteClinicRepository
#[async_trait]
pub trait ClinicRepository: Send + Sync {
    /// 按 CNPJ 获取诊所 ID，不存在则创建
    ///
    /// # 返回
    /// - Ok(String): 内部诊所 ID（重复调用返回同一 ID）
    async fn get_or_create(&self, cnpj: &str, external_id: Option<&str>) -> RepositoryResult<String>;

    /// 按 CNPJ 查询
    async fn find_by_cnpj(&self, cnpj: &str) -> RepositoryResult<Option<ClinicEntity>>;
}

// ==========================================
// SqliteClinicRepository
// ==========================================
pub struct SqliteClinicRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteClinicRepository {
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

    fn find_by_cnpj_with(conn: &Connection, cnpj: &str) -> RepositoryResult<Option<ClinicEntity>> {
        let entity = conn
            .query_row(
                "SELECT id, cnpj, external_id, nome, created_at FROM clinicas WHERE cnpj = ?1",
                params![cnpj],
                |row| {
                    Ok(ClinicEntity {
                        id: row.get(0)?,
                        cnpj: row.get(1)?,
                        external_id: row.get(2)?,
                        nome: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }
}

#[async_trait]
impl ClinicRepository for SqliteClinicRepository {
    async fn get_or_create(&self, cnpj: &str, external_id: Option<&str>) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        if let Some(existing) = Self::find_by_cnpj_with(&conn, cnpj)? {
            return Ok(existing.id);
        }

        // 并发创建时以先写入者为准
        conn.execute(
            r#"
            INSERT INTO clinicas (id, cnpj, external_id, nome, created_at)
            VALUES (?1, ?2, ?3, ?3, ?4)
            ON CONFLICT(cnpj) DO NOTHING
            "#,
            params![
                Uuid::new_v4().to_string(),
                cnpj,
                external_id,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Self::find_by_cnpj_with(&conn, cnpj)?
            .map(|entity| entity.id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "clinicas".to_string(),
                id: cnpj.to_string(),
            })
    }

    async fn find_by_cnpj(&self, cnpj: &str) -> RepositoryResult<Option<ClinicEntity>> {
        let conn = self.get_conn()?;
        Self::find_by_cnpj_with(&conn, cnpj)
    }
}
