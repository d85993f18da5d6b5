// ==========================================
// 诊所账单报表导入系统 - 身份定位器
// ==========================================
// 职责: 在全部工作表中定位 CNPJ 标识行，读取机构身份
// 规则: 按工作表声明顺序，每表仅看前 10 行第 0 列；首个命中生效
// ==========================================

use crate::domain::report::IdentityRecord;
use crate::importer::error::{ParseError, ParseResultOf};
use crate::importer::field_normalizer::to_str;
use crate::importer::workbook::{Sheet, Workbook};
use tracing::debug;

/// 身份标识行标记
pub const IDENTITY_MARKER: &str = "CNPJ";

/// 每个工作表扫描的行数上限
pub const IDENTITY_SCAN_ROWS: usize = 10;

/// 在单个工作表中查找身份
///
/// 仅使用本表第一个标识行；其下一行为空（cnpj 为 null）时返回 None
fn locate_in_sheet(sheet: &Sheet) -> Option<IdentityRecord> {
    let limit = sheet.row_count().min(IDENTITY_SCAN_ROWS);
    let marker_row = (0..limit).find(|&i| to_str(sheet.cell(i, 0)).as_deref() == Some(IDENTITY_MARKER))?;

    let cnpj = to_str(sheet.cell(marker_row + 1, 0))?;
    let external_id = to_str(sheet.cell(marker_row + 1, 1));

    debug!(sheet = %sheet.name(), row = marker_row, cnpj = %cnpj, "定位到 CNPJ 标识行");
    Some(IdentityRecord { cnpj, external_id })
}

/// 定位工作簿身份
///
/// # 返回
/// - Ok(IdentityRecord): 首个产生非空 cnpj 的工作表/行
/// - Err(ParseError::IdentityNotFound): 无任何工作表命中（整次解析失败）
pub fn locate_identity(workbook: &Workbook) -> ParseResultOf<IdentityRecord> {
    workbook
        .sheets()
        .iter()
        .find_map(locate_in_sheet)
        .ok_or(ParseError::IdentityNotFound)
}
