// ==========================================
// 诊所账单报表导入系统 - 导入领域模型
// ==========================================
// 职责: 导入汇总、导入历史记录
// ==========================================

use crate::domain::report::IdentityRecord;
use crate::domain::types::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ==========================================
// ImportSummary - 单次导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub clinica: IdentityRecord,           // 报表中定位的机构身份
    pub clinica_id: String,                // 内部诊所 ID
    pub registros: BTreeMap<Category, usize>, // 各分类记录数（规范顺序）
}

impl ImportSummary {
    /// 全部分类记录总数
    pub fn total_records(&self) -> usize {
        self.registros.values().sum()
    }
}

// ==========================================
// ImportStatus - 导入状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Concluido, // 完成
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Concluido => "concluido",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "concluido" => Some(ImportStatus::Concluido),
            _ => None,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// ImportHistoryEntry - 导入历史
// ==========================================
// 对齐: importacoes 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportHistoryEntry {
    pub id: String,
    pub clinica_id: String,
    pub arquivo_nome: String,
    pub total_linhas: i64, // 取 boletos_emitidos 记录数
    pub erros: i64,
    pub avisos: i64, // 未识别数据块数量
    pub status: ImportStatus,
    pub log: BTreeMap<Category, usize>,
    pub created_at: DateTime<Utc>,
}

impl ImportHistoryEntry {
    /// 由分类计数构造一条完成态历史记录
    pub fn completed(
        clinica_id: &str,
        arquivo_nome: &str,
        counts: &BTreeMap<Category, usize>,
        avisos: usize,
    ) -> Self {
        let total_linhas = counts
            .get(&Category::BoletosEmitidos)
            .copied()
            .unwrap_or(0);

        Self {
            id: Uuid::new_v4().to_string(),
            clinica_id: clinica_id.to_string(),
            arquivo_nome: arquivo_nome.to_string(),
            total_linhas: total_linhas as i64,
            erros: 0,
            avisos: avisos as i64,
            status: ImportStatus::Concluido,
            log: counts.clone(),
            created_at: Utc::now(),
        }
    }
}
