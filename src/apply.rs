use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use umya_spreadsheet::structs::{
    ConditionalFormatValues, ConditionalFormatting, ConditionalFormattingRule, Formula,
    PatternValues,
};
use umya_spreadsheet::{Spreadsheet, Style};

use crate::color::{resolve_color, to_argb};
use crate::column::{normalize_column, range_ref};
use crate::dxf;
use crate::rules::CfRule;
use crate::template::{RowSelection, substitute};
use crate::{CfError, DEFAULT_WORKSHEET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Create,
    Update,
}

impl Mode {
    fn file_tag(self) -> &'static str {
        match self {
            Mode::Create => "New",
            Mode::Update => "Updated",
        }
    }
}

/// 一条将要写入工作表的条件格式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRule {
    pub sqref: String,
    pub formula: String,
    pub stop_if_true: bool,
    pub priority: i32,
    /// RRGGBB
    pub fill: Option<String>,
    pub font: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoFormula,
    NoStyle,
    InvalidColumn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub worksheet: String,
    pub start_col: String,
    pub end_col: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPlan {
    pub name: String,
    /// 工作表中所有源规则，按出现顺序
    pub rules: Vec<CfRule>,
    pub planned: Vec<PlannedRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfPlan {
    pub row_value: String,
    pub first_row: u32,
    pub last_row: u32,
    pub sheets: Vec<SheetPlan>,
    pub skipped: Vec<SkippedRule>,
}

impl CfPlan {
    pub fn applied(&self) -> usize {
        self.sheets.iter().map(|s| s.planned.len()).sum()
    }
}

/// Excel 工作表名不区分大小写
pub fn same_sheet_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// 按工作表首次出现的顺序分组，组名取第一次出现时的写法。
pub fn group_by_worksheet(rules: &[CfRule]) -> Vec<(String, Vec<CfRule>)> {
    let mut groups: Vec<(String, Vec<CfRule>)> = Vec::new();
    for rule in rules {
        let name = match rule.worksheet.trim() {
            "" => DEFAULT_WORKSHEET,
            n => n,
        };
        match groups.iter_mut().find(|(n, _)| same_sheet_name(n, name)) {
            Some((_, group)) => group.push(rule.clone()),
            None => groups.push((name.to_string(), vec![rule.clone()])),
        }
    }
    groups
}

fn plan_rule(
    rule: &CfRule,
    row_value: &str,
    first_row: u32,
    last_row: u32,
    priority: i32,
) -> Result<PlannedRule, SkipReason> {
    let formula = substitute(&rule.formula, row_value);
    // CF 公式在 XML 中不带前导 '='
    let formula = formula.trim().trim_start_matches('=').trim().to_string();
    if formula.is_empty() {
        return Err(SkipReason::NoFormula);
    }

    let fill = resolve_color(&rule.bg_color, &rule.bg_rgb);
    let font = resolve_color(&rule.font_color, &rule.font_rgb);
    if fill.is_none() && font.is_none() {
        return Err(SkipReason::NoStyle);
    }
    if !rule.number_format.trim().is_empty() {
        warn!(
            number_format = %rule.number_format,
            start = %rule.start_col,
            "number format is not written into conditional formatting"
        );
    }

    let (start, end) = match (normalize_column(&rule.start_col), normalize_column(&rule.end_col)) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(err), _) | (_, Err(err)) => {
            warn!(%err, worksheet = %rule.worksheet, "skipping rule");
            return Err(SkipReason::InvalidColumn);
        }
    };

    Ok(PlannedRule {
        sqref: range_ref(&start, &end, first_row, last_row),
        formula,
        stop_if_true: rule.stop_if_true,
        priority,
        fill,
        font,
    })
}

/// 计算替换值与范围并逐条生成规则，不触碰工作簿。
pub fn plan(rules: &[CfRule], selection: &RowSelection) -> Result<CfPlan, CfError> {
    if rules.is_empty() {
        return Err(CfError::NoRules);
    }
    let row_value = selection.substitution_value()?;
    let (first_row, last_row) = selection.row_range()?;

    let mut sheets = Vec::new();
    let mut skipped = Vec::new();

    for (name, sheet_rules) in group_by_worksheet(rules) {
        let mut planned = Vec::new();
        for rule in &sheet_rules {
            let priority = planned.len() as i32 + 1;
            match plan_rule(rule, &row_value, first_row, last_row, priority) {
                Ok(p) => planned.push(p),
                Err(reason) => {
                    debug!(?reason, start = %rule.start_col, end = %rule.end_col, "rule skipped");
                    skipped.push(SkippedRule {
                        worksheet: name.clone(),
                        start_col: rule.start_col.clone(),
                        end_col: rule.end_col.clone(),
                        reason,
                    });
                }
            }
        }
        sheets.push(SheetPlan {
            name,
            rules: sheet_rules,
            planned,
        });
    }

    Ok(CfPlan {
        row_value,
        first_row,
        last_row,
        sheets,
        skipped,
    })
}

fn differential_style(rule: &PlannedRule) -> Style {
    let mut style = Style::default();
    // 不显式设置 patternType 时 umya 会写出 "none"，填充不可见
    if let Some(fill) = &rule.fill {
        let pattern = style.get_fill_mut().get_pattern_fill_mut();
        pattern.set_pattern_type(PatternValues::Solid);
        pattern.get_foreground_color_mut().set_argb(to_argb(fill));
        pattern.get_background_color_mut().set_argb(to_argb(fill));
    }
    if let Some(font) = &rule.font {
        style.get_font_mut().get_color_mut().set_argb(to_argb(font));
    }
    style
}

fn build_formatting(rule: &PlannedRule) -> ConditionalFormatting {
    let mut formula = Formula::default();
    formula.set_string_value(rule.formula.as_str());

    let mut cf_rule = ConditionalFormattingRule::default();
    cf_rule.set_type(ConditionalFormatValues::Expression);
    cf_rule.set_priority(rule.priority);
    cf_rule.set_stop_if_true(rule.stop_if_true);
    cf_rule.set_style(differential_style(rule));
    cf_rule.set_formula(formula);

    let mut formatting = ConditionalFormatting::default();
    formatting
        .get_sequence_of_references_mut()
        .set_sqref(rule.sqref.as_str());
    formatting.add_conditional_collection(cf_rule);
    formatting
}

/// 已有工作表（名称不区分大小写）的条件格式被整体替换，缺失的工作表新建。
fn install_formatting(
    book: &mut Spreadsheet,
    name: &str,
    formatting: Vec<ConditionalFormatting>,
) -> Result<(), CfError> {
    let existing = book
        .get_sheet_collection()
        .iter()
        .map(|sheet| sheet.get_name())
        .find(|existing| same_sheet_name(existing, name))
        .map(str::to_string);

    match existing.and_then(|existing| book.get_sheet_by_name_mut(&existing)) {
        Some(sheet) => {
            info!(sheet = name, "replacing existing conditional formatting");
            sheet.set_conditional_formatting_collection(formatting);
        }
        None => {
            info!(sheet = name, "creating worksheet");
            book.new_sheet(name)
                .map_err(|reason| CfError::SheetCreation {
                    sheet: name.to_string(),
                    reason: reason.to_string(),
                })?
                .set_conditional_formatting_collection(formatting);
        }
    }
    Ok(())
}

pub fn write_plan(book: &mut Spreadsheet, plan: &CfPlan) -> Result<(), CfError> {
    for sheet_plan in &plan.sheets {
        let formatting = sheet_plan
            .planned
            .iter()
            .inspect(|rule| {
                debug!(sheet = %sheet_plan.name, range = %rule.sqref, formula = %rule.formula, "adding rule")
            })
            .map(build_formatting)
            .collect();
        install_formatting(book, &sheet_plan.name, formatting)?;
    }
    Ok(())
}

/// Create 模式返回不含工作表的新工作簿，Update 模式读取目标文件。
pub fn open_book(mode: Mode, target: Option<&Path>) -> Result<Spreadsheet> {
    match mode {
        Mode::Create => {
            info!("creating new workbook");
            Ok(umya_spreadsheet::new_file_empty_worksheet())
        }
        Mode::Update => {
            let target = target.ok_or(CfError::MissingTarget)?;
            info!(path = %target.display(), "updating existing workbook");
            umya_spreadsheet::reader::xlsx::read(target)
                .with_context(|| format!("无法打开目标文件: {}", target.display()))
        }
    }
}

/// 行号可能是任意文本，只保留字母数字、'-'、'_'，其余替换为 '_'。
fn file_name_fragment(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

pub fn default_output_path(mode: Mode, plan: &CfPlan) -> PathBuf {
    PathBuf::from(format!(
        "CF_{}_Row{}_Range{}-{}.xlsx",
        mode.file_tag(),
        file_name_fragment(&plan.row_value),
        plan.first_row,
        plan.last_row
    ))
}

pub fn save_book(book: &Spreadsheet, output: &Path) -> Result<()> {
    umya_spreadsheet::writer::xlsx::write(book, output)
        .with_context(|| format!("无法保存文件: {}", output.display()))?;
    dxf::tidy_saved_workbook(output)?;
    info!(path = %output.display(), "workbook written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(start: &str, end: &str, formula: &str, bg: &str, sheet: &str) -> CfRule {
        CfRule {
            start_col: start.to_string(),
            end_col: end.to_string(),
            formula: formula.to_string(),
            bg_color: bg.to_string(),
            worksheet: sheet.to_string(),
            ..Default::default()
        }
    }

    fn selection(first: u32, last: u32) -> RowSelection {
        RowSelection {
            row_number: None,
            first_row: Some(first),
            last_row: Some(last),
        }
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let rules = vec![
            rule("A", "A", "1", "Red", "B"),
            rule("A", "A", "1", "Red", "A"),
            rule("A", "A", "1", "Red", "B"),
            rule("A", "A", "1", "Red", ""),
        ];
        let groups = group_by_worksheet(&rules);
        let names: Vec<_> = groups.iter().map(|(n, r)| (n.as_str(), r.len())).collect();
        assert_eq!(names, vec![("B", 2), ("A", 1), (DEFAULT_WORKSHEET, 1)]);
    }

    #[test]
    fn plans_range_and_substitution() {
        let mut r = rule("ae", "AJ", "=$A@ROW@=\"X\"", "", "Data");
        r.bg_rgb = "255,0,0".to_string();
        r.stop_if_true = true;

        let plan = plan(&[r], &selection(13, 15)).unwrap();
        assert_eq!(plan.row_value, "13");
        let planned = &plan.sheets[0].planned[0];
        assert_eq!(planned.sqref, "AE13:AJ15");
        assert_eq!(planned.formula, "$A13=\"X\"");
        assert_eq!(planned.fill.as_deref(), Some("FF0000"));
        assert!(planned.stop_if_true);
        assert_eq!(planned.priority, 1);
    }

    #[test]
    fn skips_rules_without_formula_or_style() {
        let rules = vec![
            rule("A", "B", "", "Red", "S"),
            rule("A", "B", "=TRUE", "NoColor", "S"),
            rule("A1", "B", "=TRUE", "Red", "S"),
            rule("C", "D", "=TRUE", "Red", "S"),
        ];
        let plan = plan(&rules, &selection(2, 4)).unwrap();

        let reasons: Vec<_> = plan.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::NoFormula, SkipReason::NoStyle, SkipReason::InvalidColumn]
        );
        assert_eq!(plan.applied(), 1);
        assert_eq!(plan.sheets[0].rules.len(), 4);
        assert_eq!(plan.sheets[0].planned[0].priority, 1);
    }

    #[test]
    fn number_format_alone_is_not_a_style() {
        let mut r = rule("A", "A", "=TRUE", "", "S");
        r.number_format = "0.00%".to_string();
        let plan = plan(&[r], &selection(1, 2)).unwrap();
        assert_eq!(plan.applied(), 0);
        assert_eq!(plan.skipped[0].reason, SkipReason::NoStyle);
    }

    #[test]
    fn fill_color_is_visible() {
        let r = rule("A", "A", "=TRUE", "Red", "S");
        let plan = plan(&[r], &selection(1, 2)).unwrap();
        let style = differential_style(&plan.sheets[0].planned[0]);

        let argb = style
            .get_background_color()
            .map(|c| c.get_argb().to_ascii_lowercase());
        assert_eq!(argb.as_deref(), Some("ffff0000"));
    }

    #[test]
    fn groups_ignore_sheet_name_case() {
        let rules = vec![
            rule("A", "A", "1", "Red", "Data"),
            rule("B", "B", "1", "Red", "DATA"),
        ];
        let groups = group_by_worksheet(&rules);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "Data");
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn existing_sheet_matched_case_insensitively() {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        book.new_sheet("data").unwrap();
        let plan = plan(&[rule("A", "B", "=TRUE", "Red", "Data")], &selection(1, 5)).unwrap();
        write_plan(&mut book, &plan).unwrap();

        let names: Vec<_> = book
            .get_sheet_collection()
            .iter()
            .map(|s| s.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["data".to_string()]);
        let sheet = book.get_sheet_by_name("data").unwrap();
        assert_eq!(sheet.get_conditional_formatting_collection().len(), 1);
    }

    #[test]
    fn output_name_sanitizes_row_value() {
        let sel = RowSelection {
            row_number: Some("5/6 $A".to_string()),
            first_row: Some(1),
            last_row: Some(3),
        };
        let plan = plan(&[rule("A", "A", "=1", "Red", "S")], &sel).unwrap();
        assert_eq!(
            default_output_path(Mode::Create, &plan),
            PathBuf::from("CF_New_Row5_6__A_Range1-3.xlsx")
        );
    }

    #[test]
    fn default_range_when_last_row_missing() {
        let sel = RowSelection {
            row_number: Some("5".to_string()),
            first_row: None,
            last_row: None,
        };
        let plan = plan(&[rule("A", "C", "=$A@ROW@", "Red", "S")], &sel).unwrap();
        assert_eq!(plan.sheets[0].planned[0].sqref, "A1:C1000");
        assert_eq!(plan.sheets[0].planned[0].formula, "$A5");
    }

    #[test]
    fn output_name_encodes_mode_and_range() {
        let plan = plan(&[rule("A", "A", "=1", "Red", "S")], &selection(13, 15)).unwrap();
        assert_eq!(
            default_output_path(Mode::Update, &plan),
            PathBuf::from("CF_Updated_Row13_Range13-15.xlsx")
        );
        assert_eq!(
            default_output_path(Mode::Create, &plan),
            PathBuf::from("CF_New_Row13_Range13-15.xlsx")
        );
    }

    #[test]
    fn update_without_target_fails() {
        let err = open_book(Mode::Update, None).err().unwrap();
        assert_eq!(err.downcast_ref::<CfError>(), Some(&CfError::MissingTarget));
    }

    #[test]
    fn write_plan_creates_sheets_in_order() {
        let rules = vec![
            rule("A", "B", "=TRUE", "Red", "Second"),
            rule("C", "C", "=TRUE", "Blue", "First"),
            rule("D", "D", "=FALSE", "Blue", "Second"),
        ];
        let plan = plan(&rules, &selection(1, 10)).unwrap();
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        write_plan(&mut book, &plan).unwrap();

        let second = book.get_sheet_by_name("Second").unwrap();
        assert_eq!(second.get_conditional_formatting_collection().len(), 2);
        let first = book.get_sheet_by_name("First").unwrap();
        assert_eq!(first.get_conditional_formatting_collection().len(), 1);
    }
}
