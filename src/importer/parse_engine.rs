// ==========================================
// 诊所账单报表导入系统 - 解析引擎
// ==========================================
// 职责: 工作簿 → ParseResult（身份 + 7 类归一化记录）
// 流程: 定位身份 → 逐表扫描数据块 → 分类 → 行归一化 → 按分类追加
// 红线: 纯函数，无 IO；同一输入两次解析结果完全相同
//       身份缺失时整体失败，不返回部分结果
// ==========================================

use crate::domain::report::ParseResult;
use crate::importer::block_classifier::BlockClassifier;
use crate::importer::block_scanner::scan_sheet;
use crate::importer::error::ParseResultOf;
use crate::importer::field_normalizer::normalize_rows;
use crate::importer::identity_locator::locate_identity;
use crate::importer::workbook::Workbook;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ==========================================
// ParseDiagnostics - 解析诊断信息
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostics {
    pub blocks_found: usize,
    pub blocks_recognized: usize,
    pub unrecognized_titles: Vec<String>, // 未识别数据块标题（原样，发现顺序）
}

impl ParseDiagnostics {
    pub fn unrecognized_count(&self) -> usize {
        self.unrecognized_titles.len()
    }
}

// ==========================================
// ParseEngine
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseEngine {
    classifier: BlockClassifier,
}

impl ParseEngine {
    pub fn new() -> Self {
        Self {
            classifier: BlockClassifier::new(),
        }
    }

    /// 解析工作簿
    pub fn parse(&self, workbook: &Workbook) -> ParseResultOf<ParseResult> {
        self.parse_with_diagnostics(workbook).map(|(result, _)| result)
    }

    /// 解析工作簿并返回诊断信息
    ///
    /// # 返回
    /// - Ok((ParseResult, ParseDiagnostics))
    /// - Err(ParseError::IdentityNotFound): 任何工作表均无 CNPJ 标识
    pub fn parse_with_diagnostics(
        &self,
        workbook: &Workbook,
    ) -> ParseResultOf<(ParseResult, ParseDiagnostics)> {
        let identity = locate_identity(workbook)?;
        let mut result = ParseResult::new(identity);
        let mut diagnostics = ParseDiagnostics::default();

        for sheet in workbook.sheets() {
            let scan = scan_sheet(sheet);
            diagnostics.blocks_found += scan.blocks.len();

            for block in scan.blocks {
                match self.classifier.matching_rule(block.title) {
                    Some(rule) => {
                        let category = rule.category;
                        diagnostics.blocks_recognized += 1;
                        debug!(
                            sheet = %sheet.name(),
                            title = %block.title,
                            category = %category,
                            rule = rule.description,
                            rows = block.data_rows.len(),
                            "数据块已识别"
                        );
                        result.extend(normalize_rows(category, block.data_rows));
                    }
                    None => {
                        debug!(
                            sheet = %sheet.name(),
                            title = %block.title,
                            first_row = block.rows.start,
                            "未识别的数据块，已丢弃"
                        );
                        diagnostics.unrecognized_titles.push(block.title.to_string());
                    }
                }
            }
        }

        info!(
            cnpj = %result.estabelecimento.cnpj,
            sheets = workbook.sheets().len(),
            blocks_found = diagnostics.blocks_found,
            blocks_recognized = diagnostics.blocks_recognized,
            "报表解析完成"
        );

        Ok((result, diagnostics))
    }

    /// 从原始字节解析
    pub fn parse_bytes(&self, bytes: &[u8], file_name: &str) -> ParseResultOf<ParseResult> {
        let workbook = Workbook::from_bytes(bytes, file_name)?;
        self.parse(&workbook)
    }

    /// 从原始字节解析并返回诊断信息
    pub fn parse_bytes_with_diagnostics(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> ParseResultOf<(ParseResult, ParseDiagnostics)> {
        let workbook = Workbook::from_bytes(bytes, file_name)?;
        self.parse_with_diagnostics(&workbook)
    }
}

/// 使用默认引擎解析上传的文件内容
pub fn parse_excel_from_bytes(bytes: &[u8], file_name: &str) -> ParseResultOf<ParseResult> {
    ParseEngine::new().parse_bytes(bytes, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::FieldValue;
    use crate::domain::types::Category;
    use crate::importer::error::ParseError;
    use crate::importer::workbook::{CellValue, Sheet};

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    fn identity_rows() -> Vec<Vec<CellValue>> {
        vec![
            vec![t("CNPJ"), t("ExternalId")],
            vec![t("12345678000190"), t("CLI-01")],
            vec![],
        ]
    }

    #[test]
    fn test_minimal_workbook() {
        let mut rows = identity_rows();
        rows.extend(vec![
            vec![t("Boletos Emitidos")],
            vec![t("MesRef"), t("Qtde"), t("Valor")],
            vec![CellValue::date(2024, 5, 1), CellValue::Int(120), CellValue::Float(15000.5)],
            vec![],
            vec![t("Inadimplência")],
            vec![t("MesRef"), t("Taxa")],
            vec![t("2024-05"), CellValue::Float(0.042)],
        ]);
        let wb = Workbook::new(vec![Sheet::new("S1", rows)]);

        let (result, diagnostics) = ParseEngine::new().parse_with_diagnostics(&wb).unwrap();

        assert_eq!(result.estabelecimento.cnpj, "12345678000190");
        assert_eq!(result.boletos_emitidos.len(), 1);
        let boleto = &result.boletos_emitidos[0];
        assert_eq!(boleto.mes_ref.as_deref(), Some("2024-05"));
        assert_eq!(boleto.qtde, Some(FieldValue::Int(120)));
        assert_eq!(boleto.valor_total, Some(FieldValue::Float(15000.5)));

        assert_eq!(result.inadimplencia.len(), 1);
        assert_eq!(result.inadimplencia[0].mes_ref.as_deref(), Some("2024-05"));
        assert_eq!(result.inadimplencia[0].taxa, Some(0.042));

        assert_eq!(diagnostics.blocks_found, 2);
        assert_eq!(diagnostics.blocks_recognized, 2);
        assert_eq!(result.counts()[&Category::TaxaAtrasoFaixa], 0);
    }

    #[test]
    fn test_unrecognized_block_is_dropped_silently() {
        let mut rows = identity_rows();
        rows.extend(vec![
            vec![t("Observações Gerais")],
            vec![t("MesRef"), t("Nota")],
            vec![t("2024-05"), t("ok")],
        ]);
        let wb = Workbook::new(vec![Sheet::new("S1", rows)]);

        let (result, diagnostics) = ParseEngine::new().parse_with_diagnostics(&wb).unwrap();

        assert!(result.is_empty());
        assert_eq!(diagnostics.blocks_found, 1);
        assert_eq!(diagnostics.blocks_recognized, 0);
        assert_eq!(diagnostics.unrecognized_titles, vec!["Observações Gerais".to_string()]);
    }

    #[test]
    fn test_missing_identity_fails_whole_parse() {
        let wb = Workbook::new(vec![Sheet::new(
            "S1",
            vec![
                vec![t("Boletos Emitidos")],
                vec![t("MesRef"), t("Qtde")],
                vec![t("2024-05"), CellValue::Int(1)],
            ],
        )]);

        let err = ParseEngine::new().parse(&wb).unwrap_err();
        assert!(matches!(err, ParseError::IdentityNotFound));
    }

    #[test]
    fn test_same_category_in_two_sheets_keeps_sheet_order() {
        let mut first = identity_rows();
        first.extend(vec![
            vec![t("Valor Médio do Boleto")],
            vec![t("MesRef"), t("Valor")],
            vec![t("2024-01"), CellValue::Int(100)],
        ]);
        let second = vec![
            vec![t("Valor medio")],
            vec![t("MesRef"), t("Valor")],
            vec![t("2024-02"), CellValue::Int(200)],
            vec![t("2024-03"), CellValue::Int(300)],
        ];
        let wb = Workbook::new(vec![Sheet::new("A", first), Sheet::new("B", second)]);

        let result = ParseEngine::new().parse(&wb).unwrap();
        let months: Vec<_> = result
            .valor_medio_boleto
            .iter()
            .map(|r| r.mes_ref.clone().unwrap_or_default())
            .collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);
    }

    #[test]
    fn test_parse_excel_from_bytes_csv() {
        let csv = "CNPJ,ExternalId\n\
                   12345678000190,CLI-01\n\
                   ,\n\
                   Parcelamentos,,,\n\
                   MesRef,Parcelas,Qtde,Percentual\n\
                   2024-05,3,10,25\n\
                   2024-05,6,4,11000000000\n";
        let result = parse_excel_from_bytes(csv.as_bytes(), "relatorio.csv").unwrap();

        assert_eq!(result.parcelamentos_detalhe.len(), 2);
        let first = &result.parcelamentos_detalhe[0];
        assert_eq!(first.qtde_parcelas, Some(FieldValue::Int(3)));
        assert_eq!(first.percentual, Some(25.0));
        let second = &result.parcelamentos_detalhe[1];
        assert!((second.percentual.unwrap() - 0.011).abs() < 1e-12);
    }
}
