// ==========================================
// 诊所账单报表导入系统 - 字段归一化
// ==========================================
// 职责: 原始单元格 → 规范标量（月份/百分比/区间标签/可序列化数值）
// 红线: 单元格格式异常只降级为 null，不中断数据块或整体解析
// ==========================================

use crate::domain::report::{
    BoletoEmitido, FieldValue, Inadimplencia, NormalizedRecord, ParcelamentoDetalhe,
    TaxaAtrasoFaixa, TaxaPagoNoVencimento, TempoMedioPagamento, ValorMedioBoleto,
};
use crate::domain::types::Category;
use crate::importer::workbook::CellValue;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// 百分比修正阈值（绝对值超过即视为上游放大了 1e12 倍）
pub const PERCENTUAL_OVERFLOW_THRESHOLD: f64 = 1e10;

/// 百分比修正除数
pub const PERCENTUAL_OVERFLOW_DIVISOR: f64 = 1e12;

// 斜杠日期按月在前解析，首段大于 12 时才按日在前
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

// 英文月份名（"May 2024" / "15 May 2024" / "May 15, 2024"）
const MONTH_NAME_FORMATS: [&str; 3] = ["%d %B %Y", "%B %d, %Y", "%B %d %Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

static EMPTY_CELL: CellValue = CellValue::Empty;

// ==========================================
// 标量转换
// ==========================================

/// 单元格的字符串形式（不去空白；空 → 空串）
pub fn render(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
    }
}

/// 单元格 → 去空白字符串（日期为 YYYY-MM-DD；空/NaN → None）
pub fn to_str(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Float(f) if f.is_nan() => None,
        _ => {
            let s = render(cell).trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
    }
}

/// 宽松日期解析（文本）
///
/// # 支持格式
/// - YYYY-MM-DD / YYYY/MM/DD / MM/DD/YYYY / DD/MM/YYYY
/// - YYYY-MM-DD HH:MM:SS（含 T 分隔与小数秒）
/// - 英文月份名: "15 May 2024" / "May 15, 2024"
/// - YYYY-MM / YYYY/MM / MM/YYYY / "May 2024"（取当月 1 日）
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }

    if let Some(d) = MONTH_NAME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }

    // 仅含年月（年份须为四位，避免 "12-05" 之类被读成公元 12 年）
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}/01", s), "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("01/{}", s), "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {}", s), "%d %B %Y"))
        .ok()
        .filter(|d| d.year() >= 1000)
}

/// 参考月份归一化: 可解析为日期 → YYYY-MM，否则回退为去空白字符串
pub fn normalize_mesref(cell: &CellValue) -> Option<String> {
    let date = match cell {
        CellValue::Date(d) => Some(d.date()),
        CellValue::Text(s) => parse_flexible_date(s),
        _ => None,
    };

    match date {
        Some(d) => Some(d.format("%Y-%m").to_string()),
        None => to_str(cell),
    }
}

/// 百分比修正
///
/// - 数值或数值文本 → f64；非数值 → None
/// - 绝对值 > 1e10 → 除以 1e12
pub fn fix_percentual(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Int(i) => *i as f64,
        CellValue::Float(f) => *f,
        CellValue::Text(s) => parse_number_text(s)?,
        CellValue::Empty | CellValue::Bool(_) | CellValue::Date(_) => return None,
    };

    if value.is_nan() {
        return None;
    }

    if value.abs() > PERCENTUAL_OVERFLOW_THRESHOLD {
        Some(value / PERCENTUAL_OVERFLOW_DIVISOR)
    } else {
        Some(value)
    }
}

fn parse_number_text(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok())
}

/// 逾期区间标签
///
/// 表格常把 "1-7"、"8-15" 之类的区间误存为日期：
/// - 7月1日 / 1月1日 → "0-7"
/// - 8月1日 → "8-15"
/// - 其他日期 → ISO 日期
/// - 非日期 → 原字符串
pub fn fix_faixa(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Date(d) => {
            let label = match (d.day(), d.month()) {
                (1, 7) | (1, 1) => "0-7".to_string(),
                (1, 8) => "8-15".to_string(),
                _ => d.date().to_string(),
            };
            Some(label)
        }
        _ => Some(render(cell)),
    }
}

/// 数值透传: NaN/无穷 → None，日期 → ISO 日期文本
pub fn json_safe(cell: &CellValue) -> Option<FieldValue> {
    match cell {
        CellValue::Empty => None,
        CellValue::Int(i) => Some(FieldValue::Int(*i)),
        CellValue::Float(f) if f.is_finite() => Some(FieldValue::Float(*f)),
        CellValue::Float(_) => None,
        CellValue::Text(s) => Some(FieldValue::Text(s.clone())),
        CellValue::Bool(b) => Some(FieldValue::Bool(*b)),
        CellValue::Date(d) => Some(FieldValue::Text(d.format("%Y-%m-%d").to_string())),
    }
}

// ==========================================
// 行 → 记录
// ==========================================

fn col(row: &[CellValue], idx: usize) -> &CellValue {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}

/// 按分类将一行数据映射为归一化记录（列位置固定，缺列视为空）
pub fn normalize_row(category: Category, row: &[CellValue]) -> NormalizedRecord {
    let mes_ref = normalize_mesref(col(row, 0));

    match category {
        Category::BoletosEmitidos => NormalizedRecord::BoletosEmitidos(BoletoEmitido {
            mes_ref,
            qtde: json_safe(col(row, 1)),
            valor_total: json_safe(col(row, 2)),
        }),
        Category::TaxaPagoNoVencimento => {
            NormalizedRecord::TaxaPagoNoVencimento(TaxaPagoNoVencimento {
                mes_ref,
                taxa: fix_percentual(col(row, 1)),
            })
        }
        Category::TaxaAtrasoFaixa => NormalizedRecord::TaxaAtrasoFaixa(TaxaAtrasoFaixa {
            mes_ref,
            faixa: fix_faixa(col(row, 1)),
            qtde: json_safe(col(row, 2)),
            percentual: fix_percentual(col(row, 3)),
        }),
        Category::Inadimplencia => NormalizedRecord::Inadimplencia(Inadimplencia {
            mes_ref,
            taxa: fix_percentual(col(row, 1)),
        }),
        Category::TempoMedioPagamento => {
            NormalizedRecord::TempoMedioPagamento(TempoMedioPagamento {
                mes_ref,
                dias: json_safe(col(row, 1)),
            })
        }
        Category::ValorMedioBoleto => NormalizedRecord::ValorMedioBoleto(ValorMedioBoleto {
            mes_ref,
            valor: json_safe(col(row, 1)),
        }),
        Category::ParcelamentosDetalhe => {
            NormalizedRecord::ParcelamentosDetalhe(ParcelamentoDetalhe {
                mes_ref,
                qtde_parcelas: json_safe(col(row, 1)),
                qtde: json_safe(col(row, 2)),
                percentual: fix_percentual(col(row, 3)),
            })
        }
    }
}

/// 整块数据行映射
pub fn normalize_rows<'a, I>(category: Category, rows: I) -> Vec<NormalizedRecord>
where
    I: IntoIterator<Item = &'a [CellValue]>,
{
    rows.into_iter()
        .map(|row| normalize_row(category, row))
        .collect()
}
