// ==========================================
// 诊所账单报表导入系统 - 数据块扫描器
// ==========================================
// 职责: 单个工作表 → 有序数据块序列（标题行 + MesRef 表头行 + 数据行）
// 红线: 游标只前进不回退，数据块之间互不重叠；
//       所有行要么归属唯一数据块，要么计入跳过行
// ==========================================

use crate::importer::identity_locator::IDENTITY_MARKER;
use crate::importer::workbook::{CellValue, Sheet};
use std::ops::Range;

/// 表头行标记
pub const HEADER_MARKER: &str = "MesRef";

// ==========================================
// DataBlock - 数据块（借用工作表行，扫描期内有效）
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock<'a> {
    pub title: &'a str,
    pub header_row: &'a [CellValue],
    pub data_rows: Vec<&'a [CellValue]>,
    pub rows: Range<usize>, // 占用行范围: 标题行 .. 最后一条数据行之后
}

// ==========================================
// SheetScan - 单表扫描结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetScan<'a> {
    pub blocks: Vec<DataBlock<'a>>,
    pub skipped_rows: Vec<usize>,
}

/// 候选标题行: 第 0 列为非空文本，且 trim 后不是 "CNPJ"
fn title_of(row: &[CellValue]) -> Option<&str> {
    let s = row.first()?.as_text()?;
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == IDENTITY_MARKER {
        None
    } else {
        Some(s)
    }
}

/// 表头行: 任一文本单元格包含 "MesRef"
pub fn is_block_header(row: &[CellValue]) -> bool {
    row.iter()
        .filter_map(CellValue::as_text)
        .any(|s| s.contains(HEADER_MARKER))
}

/// 整行为空（行不存在亦视为空）
pub fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_empty)
}

/// 扫描工作表
///
/// # 流程
/// 1. 游标 i 处第 0 列为候选标题，且 i+1 行为 MesRef 表头 → 数据块起点
/// 2. 自 i+2 起收集数据行，直到整行为空或表尾（空行不计入）
/// 3. 游标跳至最后一条数据行之后
/// 4. 其他情况游标 +1（该行计入跳过行）
///
/// 最后一行之后没有表头行，因此不会成为标题行
pub fn scan_sheet(sheet: &Sheet) -> SheetScan<'_> {
    let total = sheet.row_count();
    let mut scan = SheetScan::default();
    let mut i = 0;

    while i + 1 < total {
        let title = title_of(sheet.row(i));
        let header = sheet.row(i + 1);

        if let Some(title) = title.filter(|_| is_block_header(header)) {
            let mut j = i + 2;
            let mut data_rows = Vec::new();
            while j < total {
                let row = sheet.row(j);
                if is_blank_row(row) {
                    break;
                }
                data_rows.push(row);
                j += 1;
            }

            scan.blocks.push(DataBlock {
                title,
                header_row: header,
                data_rows,
                rows: i..j,
            });
            i = j;
            continue;
        }

        scan.skipped_rows.push(i);
        i += 1;
    }

    // 剩余未访问的行（至多最后一行）
    scan.skipped_rows.extend(i..total);
    scan
}
