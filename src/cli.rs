use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::info;

use crate::DEFAULT_RULES_SHEET;
use crate::apply::{self, Mode};
use crate::rules;
use crate::summary::Summary;
use crate::template::RowSelection;

#[derive(Debug, Parser)]
#[command(name = "cfapply")]
#[command(
    version,
    about = "Apply conditional formatting rules from a CF Rules sheet to an Excel workbook"
)]
pub struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new workbook containing only the formatted sheets
    New {
        #[command(flatten)]
        opts: ApplyArgs,
    },

    /// Add rules to an existing workbook, keeping its data
    Update {
        /// Workbook to update (xlsx)
        #[arg(short, long)]
        target: PathBuf,

        #[command(flatten)]
        opts: ApplyArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ApplyArgs {
    /// Rules file (xlsx, xls, ods or csv)
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Sheet holding the rules
    #[arg(long, default_value = DEFAULT_RULES_SHEET)]
    pub rules_sheet: String,

    /// First row of the target range
    #[arg(long)]
    pub first_row: Option<u32>,

    /// Last row of the target range
    #[arg(long)]
    pub last_row: Option<u32>,

    /// Value substituted for @ROW@ (defaults to --first-row)
    #[arg(long = "row")]
    pub row_number: Option<String>,

    /// Output file (default: CF_<mode>_Row<row>_Range<first>-<last>.xlsx)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Build the rules and print the summary without writing a file
    #[arg(long)]
    pub dry_run: bool,
}

impl ApplyArgs {
    fn selection(&self) -> RowSelection {
        RowSelection {
            row_number: self.row_number.clone(),
            first_row: self.first_row,
            last_row: self.last_row,
        }
    }
}

impl Cli {
    fn level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            _ => LevelFilter::DEBUG,
        }
    }
}

fn init_logging(level: LevelFilter) {
    // 重复初始化（如测试中多次调用 run）时忽略
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// 读取规则、生成条件格式并写出工作簿，返回汇总。
pub fn execute(mode: Mode, target: Option<PathBuf>, opts: &ApplyArgs) -> Result<Summary> {
    let rules = rules::load_rules(&opts.rules, &opts.rules_sheet)?;
    let plan = apply::plan(&rules, &opts.selection())?;

    // 先打开目标文件，保证 dry-run 也能发现目标缺失
    let mut book = apply::open_book(mode, target.as_deref())?;

    if opts.dry_run {
        info!("dry run, nothing written");
        return Ok(Summary::new(mode, &plan, None));
    }

    apply::write_plan(&mut book, &plan)?;
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| apply::default_output_path(mode, &plan));
    apply::save_book(&book, &output)?;

    Ok(Summary::new(mode, &plan, Some(output)))
}

pub fn run(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let cli = Cli::parse_from(args);
    init_logging(cli.level());

    let (mode, target, opts) = match cli.command {
        Command::New { opts } => (Mode::Create, None, opts),
        Command::Update { target, opts } => (Mode::Update, Some(target), opts),
    };

    let summary = execute(mode, target, &opts)?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cfapply").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_update_command() {
        let cli = parse(&[
            "update", "-t", "data.xlsx", "-r", "rules.xlsx", "--first-row", "13", "--last-row",
            "15", "--row", "7", "-vv",
        ]);
        assert_eq!(cli.level(), LevelFilter::DEBUG);
        let Command::Update { target, opts } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(target, PathBuf::from("data.xlsx"));
        assert_eq!(opts.rules_sheet, DEFAULT_RULES_SHEET);
        assert_eq!(
            opts.selection(),
            RowSelection {
                row_number: Some("7".to_string()),
                first_row: Some(13),
                last_row: Some(15),
            }
        );
    }

    #[test]
    fn new_command_defaults() {
        let cli = parse(&["new", "--rules", "rules.csv", "--json"]);
        assert_eq!(cli.level(), LevelFilter::WARN);
        let Command::New { opts } = cli.command else {
            panic!("expected new");
        };
        assert!(opts.json);
        assert!(!opts.dry_run);
        assert!(opts.output.is_none());
    }

    #[test]
    fn update_requires_target() {
        let res = Cli::try_parse_from(["cfapply", "update", "--rules", "r.xlsx"]);
        assert!(res.is_err());
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let res = Cli::try_parse_from(["cfapply", "-q", "-v", "new", "--rules", "r.xlsx"]);
        assert!(res.is_err());
    }
}
