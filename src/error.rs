use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfError {
    #[error("找不到规则工作表 '{sheet}'，可用工作表: {available:?}")]
    MissingRulesSheet { sheet: String, available: Vec<String> },

    #[error("规则表中没有任何规则")]
    NoRules,

    #[error("请提供 @ROW@ 的行号或起始行")]
    MissingRowNumber,

    #[error("行号必须从 1 开始: {0}")]
    ZeroRow(u32),

    #[error("起始行 {first} 大于结束行 {last}")]
    InvalidRowRange { first: u32, last: u32 },

    #[error("无效的列名: '{0}'")]
    InvalidColumn(String),

    #[error("更新模式需要提供目标文件")]
    MissingTarget,

    #[error("无法创建工作表 '{sheet}': {reason}")]
    SheetCreation { sheet: String, reason: String },
}
