// ==========================================
// 诊所账单报表导入系统 - 领域模型层
// ==========================================
// 职责: 定义报表分类、归一化记录、解析结果、导入汇总
// 红线: 不含数据访问逻辑,不含解析逻辑
// ==========================================

pub mod import;
pub mod report;
pub mod types;

// 重导出核心类型
pub use import::{ImportHistoryEntry, ImportStatus, ImportSummary};
pub use report::{
    BoletoEmitido, FieldValue, IdentityRecord, Inadimplencia, NormalizedRecord,
    ParcelamentoDetalhe, ParseResult, TaxaAtrasoFaixa, TaxaPagoNoVencimento,
    TempoMedioPagamento, ValorMedioBoleto,
};
pub use types::Category;
