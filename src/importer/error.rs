// ==========================================
// 诊所账单报表导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: ParseError（解析，纯函数）/ ImportError（导入全流程）
// ==========================================

use crate::domain::types::Category;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 解析错误类型
///
/// 解析引擎只会产生此类错误；IdentityNotFound 使整个解析失败，不返回部分结果
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("未能在文件中定位 CNPJ 标识行")]
    IdentityNotFound,

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xlsm/.xlsb/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("工作簿打开失败: {0}")]
    WorkbookOpen(String),

    #[error("工作簿无工作表")]
    EmptyWorkbook,

    #[error("CSV 解析失败: {0}")]
    Csv(String),
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ParseError {
    fn from(err: calamine::Error) -> Self {
        ParseError::WorkbookOpen(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        ParseError::Csv(err.to_string())
    }
}

/// 解析 Result 类型别名
pub type ParseResultOf<T> = Result<T, ParseError>;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 解析错误（文件内容问题） =====
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("文件读取失败: {0}")]
    FileRead(String),

    // ===== 协作方错误（下游存储问题） =====
    #[error("诊所身份解析失败: {0}")]
    ClinicResolution(#[source] RepositoryError),

    #[error("写入 {category} 失败: {source}")]
    Upsert {
        category: Category,
        #[source]
        source: RepositoryError,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否为解析阶段错误（与下游写入失败区分）
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ImportError::Parse(_) | ImportError::FileRead(_))
    }

    /// 是否为身份缺失
    pub fn is_identity_not_found(&self) -> bool {
        matches!(self, ImportError::Parse(ParseError::IdentityNotFound))
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileRead(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let parse = ImportError::from(ParseError::IdentityNotFound);
        assert!(parse.is_parse_error());
        assert!(parse.is_identity_not_found());

        let upsert = ImportError::Upsert {
            category: Category::Inadimplencia,
            source: RepositoryError::DatabaseQueryError("disk full".to_string()),
        };
        assert!(!upsert.is_parse_error());
        assert!(upsert.to_string().contains("inadimplencia"));
    }

    #[test]
    fn test_io_error_maps_to_file_read() {
        let err: ImportError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, ImportError::FileRead(_)));
    }
}
