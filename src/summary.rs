use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::apply::{CfPlan, Mode, SkipReason, SkippedRule};
use crate::column::range_ref;
use crate::rules::CfRule;
use crate::template::substitute;

const FORMULA_PREVIEW: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRow {
    pub range: String,
    pub formula: String,
    pub bg_color: String,
    pub font_color: String,
    pub stop_if_true: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub rules: Vec<RuleRow>,
}

/// 运行结果汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub mode: Mode,
    pub rules_applied: usize,
    pub rules_skipped: usize,
    pub worksheets: usize,
    pub row_value: String,
    pub first_row: u32,
    pub last_row: u32,
    pub output: Option<PathBuf>,
    pub sheets: Vec<SheetSummary>,
    pub skipped: Vec<SkippedRule>,
}

fn display_or_dash(rgb: &str, name: &str) -> String {
    [rgb, name]
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("-")
        .to_string()
}

fn truncate_formula(formula: &str) -> String {
    if formula.chars().count() > FORMULA_PREVIEW {
        let head: String = formula.chars().take(FORMULA_PREVIEW).collect();
        format!("{head}...")
    } else {
        formula.to_string()
    }
}

fn rule_row(rule: &CfRule, plan: &CfPlan) -> RuleRow {
    let formula = match substitute(&rule.formula, &plan.row_value) {
        f if f.is_empty() => "-".to_string(),
        f => truncate_formula(&f),
    };
    RuleRow {
        range: range_ref(&rule.start_col, &rule.end_col, plan.first_row, plan.last_row),
        formula,
        bg_color: display_or_dash(&rule.bg_rgb, &rule.bg_color),
        font_color: display_or_dash(&rule.font_rgb, &rule.font_color),
        stop_if_true: rule.stop_if_true,
    }
}

impl Summary {
    pub fn new(mode: Mode, plan: &CfPlan, output: Option<PathBuf>) -> Self {
        let sheets = plan
            .sheets
            .iter()
            .map(|sheet| SheetSummary {
                name: sheet.name.clone(),
                rules: sheet.rules.iter().map(|r| rule_row(r, plan)).collect(),
            })
            .collect();

        Self {
            mode,
            rules_applied: plan.applied(),
            rules_skipped: plan.skipped.len(),
            worksheets: plan.sheets.len(),
            row_value: plan.row_value.clone(),
            first_row: plan.first_row,
            last_row: plan.last_row,
            output,
            sheets,
            skipped: plan.skipped.clone(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Create => "新建文件",
            Mode::Update => "更新已有文件",
        };
        writeln!(f, "模式: {mode}")?;
        writeln!(
            f,
            "已应用规则: {}  跳过: {}  工作表: {}",
            self.rules_applied, self.rules_skipped, self.worksheets
        )?;
        writeln!(
            f,
            "@ROW@ = {}  起始行: {}  结束行: {}",
            self.row_value, self.first_row, self.last_row
        )?;
        if let Some(output) = &self.output {
            writeln!(f, "输出文件: {}", output.display())?;
        }
        if self.rules_skipped > 0 {
            writeln!(f, "{} 条规则被跳过:", self.rules_skipped)?;
            for skip in &self.skipped {
                let reason = match skip.reason {
                    SkipReason::NoFormula => "无公式",
                    SkipReason::NoStyle => "无颜色",
                    SkipReason::InvalidColumn => "列名无效",
                };
                writeln!(
                    f,
                    "  [{}] {}:{} {reason}",
                    skip.worksheet, skip.start_col, skip.end_col
                )?;
            }
        }

        for sheet in &self.sheets {
            writeln!(f)?;
            writeln!(f, "[{}] ({} 条规则)", sheet.name, sheet.rules.len())?;
            for row in &sheet.rules {
                writeln!(
                    f,
                    "  {:<14} {:<64} bg={:<12} font={:<12}{}",
                    row.range,
                    row.formula,
                    row.bg_color,
                    row.font_color,
                    if row.stop_if_true { " ✓" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}
