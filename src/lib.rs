//! 将 CF Rules 表中的条件格式规则批量写入 Excel 工作簿。

pub mod apply;
pub mod cli;
pub mod color;
pub mod column;
pub mod dxf;
pub mod error;
pub mod rules;
pub mod summary;
pub mod template;

pub use error::CfError;

/// 规则表默认工作表名
pub const DEFAULT_RULES_SHEET: &str = "CF Rules";

/// 规则未指定工作表时使用的目标工作表
pub const DEFAULT_WORKSHEET: &str = "Sheet1";
