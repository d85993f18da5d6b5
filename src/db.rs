// ==========================================
// 诊所账单报表导入系统 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 建库: clinicas / 7 张分类表 / importacoes / schema_version
// - 结构导出: 表、列、主键、外键、唯一索引
// ==========================================

use crate::domain::types::Category;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 需要每个连接单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 分类表的列类型
fn column_type(column: &str) -> &'static str {
    match column {
        "mes_ref" | "faixa" => "TEXT",
        "taxa" | "percentual" => "REAL",
        _ => "NUMERIC",
    }
}

/// 单个分类表的建表语句
///
/// 冲突键上建唯一约束，供 ON CONFLICT 定位
fn category_table_ddl(category: Category) -> String {
    let table = category.table_name();
    let columns: Vec<String> = category
        .columns()
        .iter()
        .map(|c| format!("  {} {},", c, column_type(c)))
        .collect();

    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  clinica_id TEXT NOT NULL,
{columns}
  created_at TEXT NOT NULL DEFAULT (datetime('now')),
  updated_at TEXT NOT NULL DEFAULT (datetime('now')),
  FOREIGN KEY (clinica_id) REFERENCES clinicas(id) ON DELETE CASCADE,
  UNIQUE({key})
);
CREATE INDEX IF NOT EXISTS idx_{table}_clinica ON {table}(clinica_id);
"#,
        table = table,
        columns = columns.join("\n"),
        key = category.conflict_key().join(", "),
    )
}

/// 初始化数据库结构（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
          version INTEGER PRIMARY KEY,
          applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS clinicas (
          id TEXT PRIMARY KEY,
          cnpj TEXT NOT NULL UNIQUE,
          external_id TEXT,
          nome TEXT,
          created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS importacoes (
          id TEXT PRIMARY KEY,
          clinica_id TEXT NOT NULL,
          arquivo_nome TEXT NOT NULL,
          total_linhas INTEGER NOT NULL DEFAULT 0,
          erros INTEGER NOT NULL DEFAULT 0,
          avisos INTEGER NOT NULL DEFAULT 0,
          status TEXT NOT NULL,
          log TEXT NOT NULL DEFAULT '{}',
          created_at TEXT NOT NULL,
          FOREIGN KEY (clinica_id) REFERENCES clinicas(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_importacoes_clinica
          ON importacoes(clinica_id, created_at DESC);
        "#,
    )?;

    for category in Category::ALL {
        conn.execute_batch(&category_table_ddl(category))?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        params![CURRENT_SCHEMA_VERSION],
    )?;

    match read_schema_version(conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            warn!(found = v, expected = CURRENT_SCHEMA_VERSION, "数据库 schema_version 高于当前程序版本");
        }
        _ => info!(version = CURRENT_SCHEMA_VERSION, "数据库结构已就绪"),
    }

    Ok(())
}

// ==========================================
// 结构导出
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub pk_position: i64, // 0 表示非主键列
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub references_table: String,
    pub references_column: Option<String>,
    pub on_delete: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueIndexInfo {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub unique_indexes: Vec<UniqueIndexInfo>,
}

/// 读取全部用户表结构（按表名排序，排除 sqlite_ 内部表）
pub fn describe_schema(conn: &Connection) -> rusqlite::Result<Vec<TableSchema>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    tables
        .into_iter()
        .map(|table| describe_table(conn, &table))
        .collect()
}

fn describe_table(conn: &Connection, table: &str) -> rusqlite::Result<TableSchema> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                default_value: row.get(3)?,
                pk_position: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut pk: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk_position > 0).collect();
    pk.sort_by_key(|c| c.pk_position);
    let primary_key = pk.into_iter().map(|c| c.name.clone()).collect();

    let mut stmt = conn.prepare(
        "SELECT \"from\", \"table\", \"to\", on_delete FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let foreign_keys = stmt
        .query_map(params![table], |row| {
            Ok(ForeignKeyInfo {
                column: row.get(0)?,
                references_table: row.get(1)?,
                references_column: row.get(2)?,
                on_delete: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND origin != 'pk' ORDER BY name",
    )?;
    let index_names = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut unique_indexes = Vec::with_capacity(index_names.len());
    for name in index_names {
        let mut stmt = conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let columns = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        unique_indexes.push(UniqueIndexInfo { name, columns });
    }

    Ok(TableSchema {
        name: table.to_string(),
        columns,
        primary_key,
        foreign_keys,
        unique_indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        conn
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = memory_db();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_describe_schema_reports_conflict_keys() {
        let conn = memory_db();
        init_schema(&conn).unwrap();

        let schema = describe_schema(&conn).unwrap();
        let names: Vec<&str> = schema.iter().map(|t| t.name.as_str()).collect();
        for category in Category::ALL {
            assert!(names.contains(&category.table_name()), "缺少表 {}", category);
        }
        assert!(names.contains(&"clinicas"));
        assert!(names.contains(&"importacoes"));

        let faixa = schema
            .iter()
            .find(|t| t.name == "taxa_atraso_faixa")
            .unwrap();
        assert_eq!(faixa.primary_key, vec!["id".to_string()]);
        assert!(faixa
            .unique_indexes
            .iter()
            .any(|idx| idx.columns == vec!["clinica_id", "mes_ref", "faixa"]));
        assert_eq!(faixa.foreign_keys.len(), 1);
        assert_eq!(faixa.foreign_keys[0].references_table, "clinicas");

        let clinicas = schema.iter().find(|t| t.name == "clinicas").unwrap();
        let cnpj = clinicas.columns.iter().find(|c| c.name == "cnpj").unwrap();
        assert!(cnpj.not_null);
        assert!(clinicas
            .unique_indexes
            .iter()
            .any(|idx| idx.columns == vec!["cnpj".to_string()]));
    }
}
