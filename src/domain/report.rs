// ==========================================
// 诊所账单报表导入系统 - 报表领域模型
// ==========================================
// 职责: 身份记录、各分类归一化记录、解析结果
// 红线: 记录字段顺序/形状按分类固定，不随输入变化
// ==========================================

use crate::domain::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// FieldValue - 透传字段值
// ==========================================
// 用途: 数值透传字段（qtde/valor/dias 等），源单元格可能是数值也可能是文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

// ==========================================
// IdentityRecord - 机构身份
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub cnpj: String,                // 税号
    pub external_id: Option<String>, // 外部编号
}

// ==========================================
// 各分类归一化记录
// ==========================================

/// boletos_emitidos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoletoEmitido {
    pub mes_ref: Option<String>,
    pub qtde: Option<FieldValue>,
    pub valor_total: Option<FieldValue>,
}

/// taxa_pago_no_vencimento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxaPagoNoVencimento {
    pub mes_ref: Option<String>,
    pub taxa: Option<f64>,
}

/// taxa_atraso_faixa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxaAtrasoFaixa {
    pub mes_ref: Option<String>,
    pub faixa: Option<String>,
    pub qtde: Option<FieldValue>,
    pub percentual: Option<f64>,
}

/// inadimplencia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inadimplencia {
    pub mes_ref: Option<String>,
    pub taxa: Option<f64>,
}

/// tempo_medio_pagamento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMedioPagamento {
    pub mes_ref: Option<String>,
    pub dias: Option<FieldValue>,
}

/// valor_medio_boleto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValorMedioBoleto {
    pub mes_ref: Option<String>,
    pub valor: Option<FieldValue>,
}

/// parcelamentos_detalhe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelamentoDetalhe {
    pub mes_ref: Option<String>,
    pub qtde_parcelas: Option<FieldValue>,
    pub qtde: Option<FieldValue>,
    pub percentual: Option<f64>,
}

// ==========================================
// NormalizedRecord - 带分类的归一化记录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRecord {
    BoletosEmitidos(BoletoEmitido),
    TaxaPagoNoVencimento(TaxaPagoNoVencimento),
    TaxaAtrasoFaixa(TaxaAtrasoFaixa),
    Inadimplencia(Inadimplencia),
    TempoMedioPagamento(TempoMedioPagamento),
    ValorMedioBoleto(ValorMedioBoleto),
    ParcelamentosDetalhe(ParcelamentoDetalhe),
}

fn text(v: &Option<String>) -> Option<FieldValue> {
    v.clone().map(FieldValue::Text)
}

fn float(v: Option<f64>) -> Option<FieldValue> {
    v.map(FieldValue::Float)
}

impl NormalizedRecord {
    pub fn category(&self) -> Category {
        match self {
            NormalizedRecord::BoletosEmitidos(_) => Category::BoletosEmitidos,
            NormalizedRecord::TaxaPagoNoVencimento(_) => Category::TaxaPagoNoVencimento,
            NormalizedRecord::TaxaAtrasoFaixa(_) => Category::TaxaAtrasoFaixa,
            NormalizedRecord::Inadimplencia(_) => Category::Inadimplencia,
            NormalizedRecord::TempoMedioPagamento(_) => Category::TempoMedioPagamento,
            NormalizedRecord::ValorMedioBoleto(_) => Category::ValorMedioBoleto,
            NormalizedRecord::ParcelamentosDetalhe(_) => Category::ParcelamentosDetalhe,
        }
    }

    /// 按 Category::columns() 顺序展开字段值（落库用）
    pub fn values(&self) -> Vec<Option<FieldValue>> {
        match self {
            NormalizedRecord::BoletosEmitidos(r) => {
                vec![text(&r.mes_ref), r.qtde.clone(), r.valor_total.clone()]
            }
            NormalizedRecord::TaxaPagoNoVencimento(r) => vec![text(&r.mes_ref), float(r.taxa)],
            NormalizedRecord::TaxaAtrasoFaixa(r) => vec![
                text(&r.mes_ref),
                text(&r.faixa),
                r.qtde.clone(),
                float(r.percentual),
            ],
            NormalizedRecord::Inadimplencia(r) => vec![text(&r.mes_ref), float(r.taxa)],
            NormalizedRecord::TempoMedioPagamento(r) => vec![text(&r.mes_ref), r.dias.clone()],
            NormalizedRecord::ValorMedioBoleto(r) => vec![text(&r.mes_ref), r.valor.clone()],
            NormalizedRecord::ParcelamentosDetalhe(r) => vec![
                text(&r.mes_ref),
                r.qtde_parcelas.clone(),
                r.qtde.clone(),
                float(r.percentual),
            ],
        }
    }
}

// ==========================================
// ParseResult - 解析结果
// ==========================================
// 红线: 7 个分类键恒定存在（默认空列表），调用方不会观察到缺键
// 顺序: 工作表顺序优先，表内按发现顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub estabelecimento: IdentityRecord,
    pub boletos_emitidos: Vec<BoletoEmitido>,
    pub taxa_pago_no_vencimento: Vec<TaxaPagoNoVencimento>,
    pub taxa_atraso_faixa: Vec<TaxaAtrasoFaixa>,
    pub inadimplencia: Vec<Inadimplencia>,
    pub tempo_medio_pagamento: Vec<TempoMedioPagamento>,
    pub valor_medio_boleto: Vec<ValorMedioBoleto>,
    pub parcelamentos_detalhe: Vec<ParcelamentoDetalhe>,
}

impl ParseResult {
    /// 创建空结果（身份已确定）
    pub fn new(estabelecimento: IdentityRecord) -> Self {
        Self {
            estabelecimento,
            boletos_emitidos: Vec::new(),
            taxa_pago_no_vencimento: Vec::new(),
            taxa_atraso_faixa: Vec::new(),
            inadimplencia: Vec::new(),
            tempo_medio_pagamento: Vec::new(),
            valor_medio_boleto: Vec::new(),
            parcelamentos_detalhe: Vec::new(),
        }
    }

    /// 追加一条记录到其分类下
    pub fn push(&mut self, record: NormalizedRecord) {
        match record {
            NormalizedRecord::BoletosEmitidos(r) => self.boletos_emitidos.push(r),
            NormalizedRecord::TaxaPagoNoVencimento(r) => self.taxa_pago_no_vencimento.push(r),
            NormalizedRecord::TaxaAtrasoFaixa(r) => self.taxa_atraso_faixa.push(r),
            NormalizedRecord::Inadimplencia(r) => self.inadimplencia.push(r),
            NormalizedRecord::TempoMedioPagamento(r) => self.tempo_medio_pagamento.push(r),
            NormalizedRecord::ValorMedioBoleto(r) => self.valor_medio_boleto.push(r),
            NormalizedRecord::ParcelamentosDetalhe(r) => self.parcelamentos_detalhe.push(r),
        }
    }

    pub fn extend<I: IntoIterator<Item = NormalizedRecord>>(&mut self, records: I) {
        for record in records {
            self.push(record);
        }
    }

    /// 某分类下的记录数
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::BoletosEmitidos => self.boletos_emitidos.len(),
            Category::TaxaPagoNoVencimento => self.taxa_pago_no_vencimento.len(),
            Category::TaxaAtrasoFaixa => self.taxa_atraso_faixa.len(),
            Category::Inadimplencia => self.inadimplencia.len(),
            Category::TempoMedioPagamento => self.tempo_medio_pagamento.len(),
            Category::ValorMedioBoleto => self.valor_medio_boleto.len(),
            Category::ParcelamentosDetalhe => self.parcelamentos_detalhe.len(),
        }
    }

    /// 所有分类均无记录
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.len(*c) == 0)
    }

    /// 某分类下的记录（带分类包装，落库用）
    pub fn records(&self, category: Category) -> Vec<NormalizedRecord> {
        match category {
            Category::BoletosEmitidos => self
                .boletos_emitidos
                .iter()
                .cloned()
                .map(NormalizedRecord::BoletosEmitidos)
                .collect(),
            Category::TaxaPagoNoVencimento => self
                .taxa_pago_no_vencimento
                .iter()
                .cloned()
                .map(NormalizedRecord::TaxaPagoNoVencimento)
                .collect(),
            Category::TaxaAtrasoFaixa => self
                .taxa_atraso_faixa
                .iter()
                .cloned()
                .map(NormalizedRecord::TaxaAtrasoFaixa)
                .collect(),
            Category::Inadimplencia => self
                .inadimplencia
                .iter()
                .cloned()
                .map(NormalizedRecord::Inadimplencia)
                .collect(),
            Category::TempoMedioPagamento => self
                .tempo_medio_pagamento
                .iter()
                .cloned()
                .map(NormalizedRecord::TempoMedioPagamento)
                .collect(),
            Category::ValorMedioBoleto => self
                .valor_medio_boleto
                .iter()
                .cloned()
                .map(NormalizedRecord::ValorMedioBoleto)
                .collect(),
            Category::ParcelamentosDetalhe => self
                .parcelamentos_detalhe
                .iter()
                .cloned()
                .map(NormalizedRecord::ParcelamentosDetalhe)
                .collect(),
        }
    }

    /// 各分类记录数（规范顺序）
    pub fn counts(&self) -> BTreeMap<Category, usize> {
        Category::ALL.iter().map(|c| (*c, self.len(*c))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> IdentityRecord {
        IdentityRecord {
            cnpj: "12345678000190".to_string(),
            external_id: Some("CLI-01".to_string()),
        }
    }

    #[test]
    fn test_empty_result_has_every_category_key() {
        let result = ParseResult::new(identity());
        let json = serde_json::to_value(&result).unwrap();
        let obj = json.as_object().unwrap();

        assert!(obj.contains_key("estabelecimento"));
        for category in Category::ALL {
            let list = obj.get(category.as_str()).unwrap();
            assert_eq!(list.as_array().unwrap().len(), 0);
        }
        assert!(result.is_empty());
    }

    #[test]
    fn test_push_routes_by_category() {
        let mut result = ParseResult::new(identity());
        result.push(NormalizedRecord::Inadimplencia(Inadimplencia {
            mes_ref: Some("2024-05".to_string()),
            taxa: Some(0.12),
        }));
        result.push(NormalizedRecord::Inadimplencia(Inadimplencia {
            mes_ref: Some("2024-06".to_string()),
            taxa: None,
        }));

        assert_eq!(result.len(Category::Inadimplencia), 2);
        assert_eq!(result.len(Category::BoletosEmitidos), 0);
        assert_eq!(result.counts()[&Category::Inadimplencia], 2);
        assert_eq!(result.inadimplencia[1].mes_ref.as_deref(), Some("2024-06"));
    }

    #[test]
    fn test_values_follow_column_order() {
        let record = NormalizedRecord::TaxaAtrasoFaixa(TaxaAtrasoFaixa {
            mes_ref: Some("2024-05".to_string()),
            faixa: Some("0-7".to_string()),
            qtde: Some(FieldValue::Int(12)),
            percentual: Some(0.4),
        });
        let values = record.values();

        assert_eq!(values.len(), Category::TaxaAtrasoFaixa.columns().len());
        assert_eq!(values[1], Some(FieldValue::Text("0-7".to_string())));
        assert_eq!(values[3], Some(FieldValue::Float(0.4)));
    }

    #[test]
    fn test_field_value_serializes_untagged() {
        let record = BoletoEmitido {
            mes_ref: Some("2024-05".to_string()),
            qtde: Some(FieldValue::Int(120)),
            valor_total: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"mes_ref":"2024-05","qtde":120,"valor_total":null}"#);
    }
}
