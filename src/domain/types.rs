// ==========================================
// 诊所账单报表导入系统 - 领域类型定义
// ==========================================
// 职责: 报表分类标签（7 类固定分类）及其落库元数据
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 报表分类 (Category)
// ==========================================
// 序列化格式: snake_case（与表名、结果键一致）
// 声明顺序即规范顺序（结果输出、落库、计数均按此顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BoletosEmitidos,      // 已开具票据
    TaxaPagoNoVencimento, // 到期付款率
    TaxaAtrasoFaixa,      // 分段逾期率
    Inadimplencia,        // 违约率
    TempoMedioPagamento,  // 平均付款天数
    ValorMedioBoleto,     // 票据平均金额
    ParcelamentosDetalhe, // 分期明细
}

impl Category {
    /// 全部分类（规范顺序）
    pub const ALL: [Category; 7] = [
        Category::BoletosEmitidos,
        Category::TaxaPagoNoVencimento,
        Category::TaxaAtrasoFaixa,
        Category::Inadimplencia,
        Category::TempoMedioPagamento,
        Category::ValorMedioBoleto,
        Category::ParcelamentosDetalhe,
    ];

    /// 分类标签（同时作为结果键与表名）
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BoletosEmitidos => "boletos_emitidos",
            Category::TaxaPagoNoVencimento => "taxa_pago_no_vencimento",
            Category::TaxaAtrasoFaixa => "taxa_atraso_faixa",
            Category::Inadimplencia => "inadimplencia",
            Category::TempoMedioPagamento => "tempo_medio_pagamento",
            Category::ValorMedioBoleto => "valor_medio_boleto",
            Category::ParcelamentosDetalhe => "parcelamentos_detalhe",
        }
    }

    /// 落库表名
    pub fn table_name(&self) -> &'static str {
        self.as_str()
    }

    /// 记录字段（固定顺序，与 NormalizedRecord::values 对齐）
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Category::BoletosEmitidos => &["mes_ref", "qtde", "valor_total"],
            Category::TaxaPagoNoVencimento => &["mes_ref", "taxa"],
            Category::TaxaAtrasoFaixa => &["mes_ref", "faixa", "qtde", "percentual"],
            Category::Inadimplencia => &["mes_ref", "taxa"],
            Category::TempoMedioPagamento => &["mes_ref", "dias"],
            Category::ValorMedioBoleto => &["mes_ref", "valor"],
            Category::ParcelamentosDetalhe => &["mes_ref", "qtde_parcelas", "qtde", "percentual"],
        }
    }

    /// Upsert 冲突键
    pub fn conflict_key(&self) -> &'static [&'static str] {
        match self {
            Category::TaxaAtrasoFaixa => &["clinica_id", "mes_ref", "faixa"],
            Category::ParcelamentosDetalhe => &["clinica_id", "mes_ref", "qtde_parcelas"],
            _ => &["clinica_id", "mes_ref"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == tag)
            .ok_or_else(|| format!("未知分类: {}", tag))
    }
}
