use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use sheetlens::data::filter::FilterStateEntry;
use sheetlens::data::inference::AnalysisOptions;
use sheetlens::data::model::{ColumnStatistics, ExcelData};
use sheetlens::data::progress::ProgressEvent;
use sheetlens::{IngestConfig, ParseOptions, Session, parse_path, validate_data};

#[derive(Debug, Parser)]
#[command(name = "sheetlens", version, about = "Inspect and filter spreadsheet data")]
struct Cli {
    /// Spreadsheet, CSV, JSON or Parquet file
    file: PathBuf,

    /// Sheet to analyze (defaults to the first)
    #[arg(long)]
    sheet: Option<String>,

    /// Skip min/max/average/median/mode computation
    #[arg(long)]
    no_stats: bool,

    /// Saved filter state (JSON array) to apply
    #[arg(long, value_name = "STATE.json")]
    filters: Option<PathBuf>,

    /// Ingestion settings overriding the defaults
    #[arg(long, value_name = "CONFIG.json")]
    config: Option<PathBuf>,

    /// Print a machine-readable report instead of text
    #[arg(long)]
    json: bool,

    /// Number of matching rows to print
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => IngestConfig::from_json_file(path)?,
        None => IngestConfig::default(),
    };

    let progress = |event: ProgressEvent| log::debug!("{event:?}");
    let mut options = ParseOptions::default().with_progress(&progress);
    options.sheet_name = cli.sheet.clone();
    options.analysis = AnalysisOptions {
        compute_statistics: !cli.no_stats,
        ..AnalysisOptions::default()
    };

    let data = parse_path(&cli.file, &options, &config)
        .with_context(|| format!("Failed to load {}", cli.file.display()))?;
    let issues = validate_data(&data);

    let mut session = Session::new(data, &config);
    if let Some(path) = &cli.filters {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading filter state {}", path.display()))?;
        let entries: Vec<FilterStateEntry> =
            serde_json::from_str(&text).context("parsing filter state JSON")?;
        let applied = session.import_state(&entries);
        log::info!("applied {applied} of {} saved filters", entries.len());
    }

    if cli.json {
        let report = json!({
            "metadata": session.data.metadata,
            "headers": session.data.headers,
            "issues": issues,
            "filters": session.engine.export_filter_state(),
            "matchingRows": session.visible_indices().len(),
            "rows": session.visible_rows().take(cli.limit).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_summary(&session.data);
    if !issues.is_empty() {
        println!();
        for issue in &issues {
            println!("{issue}");
        }
    }

    println!();
    println!(
        "{} of {} rows match {} active filter(s)",
        session.visible_indices().len(),
        session.data.len(),
        session.engine.active_count()
    );
    println!("{}", session.data.headers.join("\t"));
    for row in session.visible_rows().take(cli.limit) {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    Ok(())
}

fn print_summary(data: &ExcelData) {
    let meta = &data.metadata;
    println!(
        "{} [{}] {} rows x {} columns ({} bytes)",
        meta.file_name, meta.active_sheet, meta.total_rows, meta.total_columns, meta.file_size
    );
    if meta.sheet_names.len() > 1 {
        println!("sheets: {}", meta.sheet_names.join(", "));
    }
    println!();
    for column in &meta.columns {
        let stats = match &column.statistics {
            Some(ColumnStatistics::Numeric {
                min,
                max,
                average,
                median,
                mode,
            }) => format!("min {min} max {max} avg {average:.3} median {median} mode {mode}"),
            Some(ColumnStatistics::Date { min, max }) => format!("from {min} to {max}"),
            _ => String::new(),
        };
        println!(
            "{:<24} {:<8} nulls {:<6} unique {:<6} {}",
            column.name, column.column_type, column.null_count, column.unique_count, stats
        );
    }
}
