// ==========================================
// 诊所账单报表导入系统 - 数据块分类器
// ==========================================
// 职责: 数据块标题 → 7 类分类之一，或未识别（丢弃）
// 规则: 有序规则表自上而下匹配，首条命中生效
//       （分类文本可能重叠，如同时含 "pagamento" 与 "parcel"）
// 匹配: 先 trim + 小写；平均付款天数规则额外去除重音
// ==========================================

use crate::domain::types::Category;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static BOLETOS_EMITIDOS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"boletos?\s*emit").expect("boletos_emitidos 正则无效"));

// ==========================================
// ClassificationRule - 分类规则
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub category: Category,
    pub description: &'static str,
    matches: fn(&str) -> bool, // 入参为已 trim + 小写的标题
}

impl ClassificationRule {
    pub fn matches(&self, normalized_title: &str) -> bool {
        (self.matches)(normalized_title)
    }
}

/// 规范规则顺序（顺序即优先级）
pub static CLASSIFICATION_RULES: [ClassificationRule; 7] = [
    ClassificationRule {
        category: Category::BoletosEmitidos,
        description: "boleto(s) emit…",
        matches: is_boletos_emitidos,
    },
    ClassificationRule {
        category: Category::TaxaPagoNoVencimento,
        description: "pagamento no vencimento | taxa de pagamento",
        matches: is_taxa_pago_no_vencimento,
    },
    ClassificationRule {
        category: Category::TaxaAtrasoFaixa,
        description: "taxa de atraso",
        matches: is_taxa_atraso,
    },
    ClassificationRule {
        category: Category::Inadimplencia,
        description: "inadimpl",
        matches: is_inadimplencia,
    },
    ClassificationRule {
        category: Category::TempoMedioPagamento,
        description: "tempo médio de pagamento | médio de pagamento após o vencimento",
        matches: is_tempo_medio_pagamento,
    },
    ClassificationRule {
        category: Category::ValorMedioBoleto,
        description: "valor médio",
        matches: is_valor_medio,
    },
    ClassificationRule {
        category: Category::ParcelamentosDetalhe,
        description: "parcel",
        matches: is_parcelamento,
    },
];

fn is_boletos_emitidos(title: &str) -> bool {
    BOLETOS_EMITIDOS_RE.is_match(title)
}

fn is_taxa_pago_no_vencimento(title: &str) -> bool {
    title.contains("pagamento no vencimento") || title.contains("taxa de pagamento")
}

fn is_taxa_atraso(title: &str) -> bool {
    title.contains("taxa de atraso")
}

fn is_inadimplencia(title: &str) -> bool {
    title.contains("inadimpl")
}

fn is_tempo_medio_pagamento(title: &str) -> bool {
    let folded = fold_accents(title);
    ["tempo medio de pagamento", "medio de pagamento apos o vencimento"]
        .iter()
        .any(|phrase| folded.contains(phrase))
}

fn is_valor_medio(title: &str) -> bool {
    title.contains("valor médio") || title.contains("valor medio")
}

fn is_parcelamento(title: &str) -> bool {
    title.contains("parcel")
}

/// 去除重音（NFD 分解后丢弃组合附加符）
pub fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// 标题规范化: trim + 小写
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

// ==========================================
// BlockClassifier
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct BlockClassifier {
    rules: &'static [ClassificationRule],
}

impl Default for BlockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockClassifier {
    pub fn new() -> Self {
        Self {
            rules: &CLASSIFICATION_RULES,
        }
    }

    pub fn rules(&self) -> &'static [ClassificationRule] {
        self.rules
    }

    /// 标题分类
    ///
    /// # 返回
    /// - Some(Category): 首条命中规则的分类
    /// - None: 未识别（调用方丢弃该块，不视为错误）
    pub fn classify(&self, title: &str) -> Option<Category> {
        self.matching_rule(title).map(|rule| rule.category)
    }

    /// 首条命中的规则
    pub fn matching_rule(&self, title: &str) -> Option<&'static ClassificationRule> {
        let normalized = normalize_title(title);
        self.rules.iter().find(|rule| rule.matches(&normalized))
    }
}

/// 使用规范规则表分类
pub fn classify(title: &str) -> Option<Category> {
    BlockClassifier::new().classify(title)
}
