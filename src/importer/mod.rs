// ==========================================
// 诊所账单报表导入系统 - 导入层
// ==========================================
// 职责: 多工作表报表 → 归一化记录 → 落库
// 支持: Excel (.xlsx/.xlsm/.xlsb/.xls), ODS, CSV
// ==========================================

// 模块声明
pub mod block_classifier;
pub mod block_scanner;
pub mod error;
pub mod field_normalizer;
pub mod identity_locator;
pub mod parse_engine;
pub mod report_importer;
pub mod report_importer_trait;
pub mod workbook;

// 重导出核心类型
pub use block_classifier::{classify, BlockClassifier, ClassificationRule, CLASSIFICATION_RULES};
pub use block_scanner::{scan_sheet, DataBlock, SheetScan, HEADER_MARKER};
pub use error::{ImportError, ImportResult, ParseError, ParseResultOf};
pub use field_normalizer::{fix_faixa, fix_percentual, json_safe, normalize_mesref, normalize_row, to_str};
pub use identity_locator::{locate_identity, IDENTITY_MARKER, IDENTITY_SCAN_ROWS};
pub use parse_engine::{parse_excel_from_bytes, ParseDiagnostics, ParseEngine};
pub use report_importer::ReportImporterImpl;
pub use workbook::{CellValue, Sheet, Workbook};

// 重导出 Trait 接口
pub use report_importer_trait::ReportImporter;
