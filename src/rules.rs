use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, open_workbook_auto};
use tracing::{debug, info};

use crate::{CfError, DEFAULT_WORKSHEET};

/// 规则表的列数：起始列 … 工作表
const RULE_COLUMNS: u32 = 10;

const FORMULA_COLUMN: u32 = 2;

/// CF Rules 表中的一行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CfRule {
    pub start_col: String,
    pub end_col: String,
    pub formula: String,
    pub stop_if_true: bool,
    pub bg_color: String,
    pub bg_rgb: String,
    pub font_color: String,
    pub font_rgb: String,
    pub number_format: String,
    pub worksheet: String,
}

impl CfRule {
    /// 起始列为空的行返回 None。
    pub fn from_row(cells: &[String]) -> Option<Self> {
        let cell = |i: usize| cells.get(i).map(|s| s.trim().to_string()).unwrap_or_default();

        let start_col = cell(0);
        if start_col.is_empty() {
            return None;
        }

        let end_col = match cell(1) {
            e if e.is_empty() => start_col.clone(),
            e => e,
        };
        let worksheet = match cell(9) {
            w if w.is_empty() => DEFAULT_WORKSHEET.to_string(),
            w => w,
        };

        Some(Self {
            start_col,
            end_col,
            // 公式保留原样，只去掉首尾空白
            formula: cell(2),
            stop_if_true: parse_flag(&cell(3)),
            bg_color: cell(4),
            bg_rgb: cell(5),
            font_color: cell(6),
            font_rgb: cell(7),
            number_format: cell(8),
            worksheet,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_uppercase().as_str(), "Y" | "YES" | "TRUE")
}

fn datatype_to_string(cell: Option<&Data>) -> String {
    match cell {
        None => String::new(),
        Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.clone(),
        Some(Data::Float(n)) => {
            if n.fract() == 0.0 {
                format!("{:.0}", n)
            } else {
                n.to_string()
            }
        }
        Some(Data::Int(n)) => n.to_string(),
        // Stop If True 可能被存成布尔单元格
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::Error(e)) => format!("{e:?}"),
        Some(Data::DateTime(f)) => f.to_string(),
        Some(other) => format!("{other:?}"),
    }
}

/// 公式列中真正的公式文本，补上前导 '='。
fn formula_text(formulas: Option<&Range<String>>, row: u32) -> Option<String> {
    let text = formulas?.get_value((row, FORMULA_COLUMN))?.trim();
    if text.is_empty() {
        return None;
    }
    Some(if text.starts_with('=') {
        text.to_string()
    } else {
        format!("={text}")
    })
}

fn collect_rules(rows: impl IntoIterator<Item = Vec<String>>) -> Result<Vec<CfRule>, CfError> {
    let rules: Vec<CfRule> = rows
        .into_iter()
        .filter_map(|row| CfRule::from_row(&row))
        .collect();

    if rules.is_empty() {
        return Err(CfError::NoRules);
    }
    Ok(rules)
}

/// 读取 xlsx/xls/ods 中的规则工作表，跳过表头。
pub fn read_workbook_rules(path: &Path, sheet_name: &str) -> Result<Vec<CfRule>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("无法打开规则文件: {}", path.display()))?;

    let sheet_names = workbook.sheet_names();
    if !sheet_names.iter().any(|n| n == sheet_name) {
        return Err(CfError::MissingRulesSheet {
            sheet: sheet_name.to_string(),
            available: sheet_names,
        }
        .into());
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("无法读取工作表: {sheet_name}"))?;
    // 公式列可能存的是真正的公式，worksheet_range 只给出缓存值
    let formulas = match workbook.worksheet_formula(sheet_name) {
        Ok(formulas) => Some(formulas),
        Err(err) => {
            debug!(%err, sheet = sheet_name, "no formula cells available");
            None
        }
    };

    let last_row = [range.end(), formulas.as_ref().and_then(|f| f.end())]
        .into_iter()
        .flatten()
        .map(|(row, _)| row)
        .max();

    let mut rows = Vec::new();
    if let Some(last_row) = last_row {
        // range 可能不从 A1 开始，按绝对坐标取值
        for row in 1..=last_row {
            let mut cells: Vec<String> = (0..RULE_COLUMNS)
                .map(|col| datatype_to_string(range.get_value((row, col))))
                .collect();
            if let Some(text) = formula_text(formulas.as_ref(), row) {
                cells[FORMULA_COLUMN as usize] = text;
            }
            rows.push(cells);
        }
    }
    debug!(rows = rows.len(), sheet = sheet_name, "read rule rows");

    Ok(collect_rules(rows)?)
}

/// 读取 CSV 规则文件，首行为表头，允许短行。
pub fn read_csv_rules(path: &Path) -> Result<Vec<CfRule>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("无法打开规则文件: {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("无法解析 CSV: {}", path.display()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(collect_rules(rows)?)
}

/// 按扩展名选择读取方式。
pub fn load_rules(path: &Path, sheet_name: &str) -> Result<Vec<CfRule>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let rules = if is_csv {
        read_csv_rules(path)?
    } else {
        read_workbook_rules(path, sheet_name)?
    };
    info!(count = rules.len(), path = %path.display(), "loaded rules");
    Ok(rules)
}
