// ==========================================
// 诊所账单报表导入系统 - 工作簿读取
// ==========================================
// 职责: 原始字节 → 只读工作簿网格（多工作表，按声明顺序）
// 支持: Excel (.xlsx/.xlsm/.xlsb/.xls) / ODS / CSV（单表）
// 约定: 坐标为绝对坐标，行/列 0 恒指 A1
// ==========================================

use crate::importer::error::{ParseError, ParseResultOf};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// 允许的扩展名（无扩展名时按内容探测）
const SUPPORTED_EXTENSIONS: [&str; 6] = ["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"];

static EMPTY_CELL: CellValue = CellValue::Empty;

// ==========================================
// CellValue - 单元格标量
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// 日期单元格便捷构造（零点）
    pub fn date(year: i32, month: u32, day: u32) -> Self {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(CellValue::Date)
            .unwrap_or(CellValue::Empty)
    }

    pub fn text(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

// ==========================================
// Sheet - 工作表网格
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 读取整行（越界返回空切片）
    pub fn row(&self, idx: usize) -> &[CellValue] {
        self.rows.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 读取单元格（越界视为空）
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.row(row).get(col).unwrap_or(&EMPTY_CELL)
    }
}

// ==========================================
// Workbook - 工作簿
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// 从原始字节加载工作簿
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（仅用于识别 CSV 及命名单表）
    pub fn from_bytes(bytes: &[u8], file_name: &str) -> ParseResultOf<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !ext.is_empty() && !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ParseError::UnsupportedFormat(ext));
        }

        let workbook = if ext == "csv" {
            let sheet_name = Path::new(file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("csv");
            Self::from_csv_bytes(bytes, sheet_name)?
        } else {
            Self::from_spreadsheet_bytes(bytes)?
        };

        if workbook.sheets.is_empty() {
            return Err(ParseError::EmptyWorkbook);
        }

        debug!(file_name = %file_name, sheets = workbook.sheets.len(), "工作簿加载完成");
        Ok(workbook)
    }

    /// 从磁盘读取并加载
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, crate::importer::error::ImportError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(Self::from_bytes(&bytes, file_name)?)
    }

    fn from_spreadsheet_bytes(bytes: &[u8]) -> ParseResultOf<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            sheets.push(Sheet::new(name, range_to_grid(&range)));
        }

        Ok(Self { sheets })
    }

    fn from_csv_bytes(bytes: &[u8], sheet_name: &str) -> ParseResultOf<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // csv 读取器跳过空行；按原始字节补回空行，保证块边界与行坐标不变
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut record = StringRecord::new();
        let mut consumed = 0usize;
        while reader.read_record(&mut record)? {
            let blank = leading_blank_lines(bytes, consumed);
            rows.extend(std::iter::repeat_with(Vec::new).take(blank));
            rows.push(record.iter().map(csv_field_to_cell).collect());
            consumed = reader.position().byte() as usize;
        }

        Ok(Self {
            sheets: vec![Sheet::new(sheet_name, rows)],
        })
    }
}

// ==========================================
// 单元格转换
// ==========================================

/// calamine 区域 → 绝对坐标网格（补齐起始偏移）
fn range_to_grid(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut grid: Vec<Vec<CellValue>> = (0..start_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col as usize];
        cells.extend(row.iter().map(convert_cell));
        grid.push(cells);
    }
    grid
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => number_cell(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(v) => CellValue::Date(v),
            None => number_cell(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// 整数值的浮点数按整数保存（表格中 120 读为 120，而非 120.0）
fn number_cell(v: f64) -> CellValue {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        CellValue::Int(v as i64)
    } else {
        CellValue::Float(v)
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// 从 start 起连续的空行数（\n、\r\n、\r 均计一行）
fn leading_blank_lines(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    // 上一条记录止于 \r 时，配对的 \n 留在本段开头
    if i > 0 && bytes.get(i - 1) == Some(&b'\r') && bytes.get(i) == Some(&b'\n') {
        i += 1;
    }

    let mut blank = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\n' => i += 1,
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            b'\r' => i += 1,
            _ => break,
        }
        blank += 1;
    }
    blank
}

/// CSV 字段类型推断: 空 → Empty，整数 → Int，浮点 → Float，其余文本
fn csv_field_to_cell(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }
    let trimmed = field.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return CellValue::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return CellValue::Float(f);
        }
    }
    CellValue::Text(field.to_string())
}
