use crate::CfError;

pub const ROW_PLACEHOLDER: &str = "@ROW@";

/// 未同时给出起止行时的默认应用范围
pub const DEFAULT_FIRST_ROW: u32 = 1;
pub const DEFAULT_LAST_ROW: u32 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelection {
    pub row_number: Option<String>,
    pub first_row: Option<u32>,
    pub last_row: Option<u32>,
}

impl RowSelection {
    /// @ROW@ 的替换值：优先使用显式行号，否则使用起始行。
    pub fn substitution_value(&self) -> Result<String, CfError> {
        if let Some(row) = self.row_number.as_deref().map(str::trim) {
            if !row.is_empty() {
                return Ok(row.to_string());
            }
        }
        self.first_row
            .map(|row| row.to_string())
            .ok_or(CfError::MissingRowNumber)
    }

    pub fn row_range(&self) -> Result<(u32, u32), CfError> {
        for row in [self.first_row, self.last_row].into_iter().flatten() {
            if row == 0 {
                return Err(CfError::ZeroRow(row));
            }
        }

        match (self.first_row, self.last_row) {
            (Some(first), Some(last)) if first > last => {
                Err(CfError::InvalidRowRange { first, last })
            }
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Ok((DEFAULT_FIRST_ROW, DEFAULT_LAST_ROW)),
        }
    }
}

pub fn substitute(formula: &str, value: &str) -> String {
    formula.replace(ROW_PLACEHOLDER, value)
}
