//! PV Forecast Adjuster Evaluation
//!
//! Compares ML forecast-error adjusters against a rule-based correction
//! over a rolling daily window and writes the comparison tables as CSV.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate the gradient boosted adjuster with defaults
//! pv-adjust-eval evaluate --input data/forecasts.csv
//!
//! # Evaluate the in-context tabular adjuster from a config file
//! pv-adjust-eval evaluate --input data/forecasts.csv \
//!     --config config/eval.toml --model tabular-foundation
//!
//! # Summarize a dataset without running anything
//! pv-adjust-eval inspect --input data/forecasts.csv
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;

use pv_adjust_eval::data::{build_dataset, load_csv};
use pv_adjust_eval::models::ModelKind;
use pv_adjust_eval::rolling::{
    AggregateReport, DateStatus, EvalConfig, GroupErrors, RollingRunner,
};

const SEPARATOR: &str = "============================================================";

/// Rolling adjuster evaluation CLI.
#[derive(Parser)]
#[command(name = "pv-adjust-eval")]
#[command(about = "Rolling evaluation of PV forecast-error adjusters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rolling evaluation and write comparison tables
    Evaluate {
        /// Path to the forecast CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Optional TOML config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// First evaluation date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Adjuster strategy to evaluate
        #[arg(short, long)]
        model: Option<ModelKind>,

        /// Trailing train window in days
        #[arg(long)]
        lookback_days: Option<i64>,

        /// Keep only the k best-ranked features
        #[arg(long)]
        top_k: Option<usize>,

        /// Seed for the feature-selection shuffles
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory for the result tables
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Load a forecast CSV and print dataset statistics
    Inspect {
        /// Path to the forecast CSV
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pv_adjust_eval=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            input,
            config,
            start_date,
            model,
            lookback_days,
            top_k,
            seed,
            output,
        } => {
            let mut cfg = match config {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    toml::from_str(&text)
                        .with_context(|| format!("parsing config {}", path.display()))?
                }
                None => EvalConfig::default(),
            };
            if let Some(date) = start_date {
                cfg.start_date = date;
            }
            if let Some(kind) = model {
                cfg.model_kind = kind;
            }
            if let Some(days) = lookback_days {
                cfg.lookback_days = days;
            }
            if let Some(k) = top_k {
                cfg.feature_top_k = Some(k);
            }
            if let Some(s) = seed {
                cfg.random_seed = s;
            }
            cmd_evaluate(&input, cfg, &output)?;
        }
        Commands::Inspect { input } => cmd_inspect(&input)?,
    }

    Ok(())
}

fn cmd_evaluate(input: &Path, config: EvalConfig, output: &Path) -> Result<()> {
    let records = load_csv(input)?;
    let dataset = build_dataset(records);
    println!(
        "Loaded {} rows ({} with truth) from {}",
        dataset.len(),
        dataset.target_count(),
        input.display()
    );

    let mut runner = RollingRunner::new(config, dataset)?;

    let pb = ProgressBar::new(runner.total_dates() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    while let Some(outcome) = runner.step()? {
        match &outcome.status {
            DateStatus::Succeeded { rows_scored, .. } => {
                pb.set_message(format!("{}: {} rows", outcome.date, rows_scored));
            }
            DateStatus::Skipped { reason } => {
                pb.set_message(format!("{}: skipped ({})", outcome.date, reason));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("evaluation complete");

    let report = runner.report()?;
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;
    write_tables(&report, runner.prediction_results(), runner.outcomes(), output)?;
    print_summary(&report);
    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<()> {
    let records = load_csv(input)?;
    let dataset = build_dataset(records);

    println!("{}", SEPARATOR);
    println!("Dataset: {}", input.display());
    println!("  Rows:       {}", dataset.len());
    println!("  With truth: {}", dataset.target_count());
    println!("  Features:   {}", dataset.feature_count());
    if let (Some(first), Some(last)) = (dataset.min_timestamp(), dataset.max_timestamp()) {
        println!("  Span:       {} to {}", first, last);
    }
    println!("{}", SEPARATOR);
    Ok(())
}

fn print_summary(report: &AggregateReport) {
    println!("{}", SEPARATOR);
    println!(
        "Dates processed: {} ({} skipped), rows scored: {}, rows excluded: {}",
        report.processed_dates,
        report.skipped.len(),
        report.overall.row_count,
        report.rows_excluded
    );
    println!(
        "Model    MAE {:.3} MW, RMSE {:.3} MW",
        report.overall.model_mae, report.overall.model_rmse
    );
    println!(
        "Baseline MAE {:.3} MW, RMSE {:.3} MW",
        report.overall.baseline_mae, report.overall.baseline_rmse
    );
    println!(
        "MAE improvement over baseline: {:.1}%",
        report.mae_improvement() * 100.0
    );
    for skip in &report.skipped {
        println!("  skipped {}: {}", skip.date, skip.reason);
    }
    println!("{}", SEPARATOR);
}

/// Write the grouped tables plus the flattened per-row results.
fn write_tables(
    report: &AggregateReport,
    results: &[pv_adjust_eval::PredictionResult],
    outcomes: &[pv_adjust_eval::DateOutcome],
    output: &Path,
) -> Result<()> {
    let overall = group_frame(
        "scope",
        vec!["overall".to_string()],
        std::iter::once(&report.overall),
    )?;
    write_csv(&output.join("overall.csv"), overall)?;

    let per_date = group_frame(
        "date",
        report.per_date.keys().map(|d| d.to_string()).collect(),
        report.per_date.values(),
    )?;
    write_csv(&output.join("per_date.csv"), per_date)?;

    let per_horizon = group_frame(
        "horizon_minutes",
        report.per_horizon.keys().map(|h| h.to_string()).collect(),
        report.per_horizon.values(),
    )?;
    write_csv(&output.join("per_horizon.csv"), per_horizon)?;

    let per_hour = group_frame(
        "hour",
        report.per_hour.keys().map(|h| h.to_string()).collect(),
        report.per_hour.values(),
    )?;
    write_csv(&output.join("per_hour.csv"), per_hour)?;

    let mut horizon_col = Vec::with_capacity(report.per_horizon_hour.len());
    let mut hour_col = Vec::with_capacity(report.per_horizon_hour.len());
    for &(horizon, hour) in report.per_horizon_hour.keys() {
        horizon_col.push(horizon);
        hour_col.push(hour);
    }
    let mut per_horizon_hour = group_frame(
        "hour",
        hour_col.iter().map(|h| h.to_string()).collect(),
        report.per_horizon_hour.values(),
    )?;
    per_horizon_hour.insert_column(0, Column::new("horizon_minutes".into(), horizon_col))?;
    write_csv(&output.join("per_horizon_hour.csv"), per_horizon_hour)?;

    let final_results = df!(
        "timestamp" => results
            .iter()
            .map(|r| r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect::<Vec<_>>(),
        "horizon_minutes" => results.iter().map(|r| r.horizon_minutes).collect::<Vec<_>>(),
        "hour" => results.iter().map(|r| r.hour).collect::<Vec<_>>(),
        "actual_mw" => results.iter().map(|r| r.actual_mw).collect::<Vec<_>>(),
        "forecast_mw" => results.iter().map(|r| r.forecast_mw).collect::<Vec<_>>(),
        "model_adjusted_mw" => results.iter().map(|r| r.model_adjusted_mw).collect::<Vec<_>>(),
        "baseline_adjusted_mw" => results.iter().map(|r| r.baseline_adjusted_mw).collect::<Vec<_>>(),
    )?;
    write_csv(&output.join("final_results.csv"), final_results)?;

    let dates = df!(
        "date" => outcomes.iter().map(|o| o.date.to_string()).collect::<Vec<_>>(),
        "status" => outcomes
            .iter()
            .map(|o| match o.status {
                DateStatus::Succeeded { .. } => "succeeded",
                DateStatus::Skipped { .. } => "skipped",
            })
            .collect::<Vec<_>>(),
        "rows_scored" => outcomes
            .iter()
            .map(|o| match o.status {
                DateStatus::Succeeded { rows_scored, .. } => Some(rows_scored as i64),
                DateStatus::Skipped { .. } => None,
            })
            .collect::<Vec<_>>(),
        "detail" => outcomes
            .iter()
            .map(|o| match &o.status {
                DateStatus::Succeeded { model, baseline, .. } => {
                    format!("model MAE {:.3}, baseline MAE {:.3}", model.mae, baseline.mae)
                }
                DateStatus::Skipped { reason } => reason.clone(),
            })
            .collect::<Vec<_>>(),
    )?;
    write_csv(&output.join("dates.csv"), dates)?;

    println!("Wrote result tables to {}", output.display());
    Ok(())
}

fn group_frame<'a>(
    key_name: &str,
    keys: Vec<String>,
    groups: impl Iterator<Item = &'a GroupErrors>,
) -> Result<DataFrame> {
    let groups: Vec<&GroupErrors> = groups.collect();
    let df = df!(
        key_name => keys,
        "model_mae" => groups.iter().map(|g| g.model_mae).collect::<Vec<_>>(),
        "model_rmse" => groups.iter().map(|g| g.model_rmse).collect::<Vec<_>>(),
        "baseline_mae" => groups.iter().map(|g| g.baseline_mae).collect::<Vec<_>>(),
        "baseline_rmse" => groups.iter().map(|g| g.baseline_rmse).collect::<Vec<_>>(),
        "rows" => groups.iter().map(|g| g.row_count as i64).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

fn write_csv(path: &Path, mut df: DataFrame) -> Result<()> {
    let mut file = fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
