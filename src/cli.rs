//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, CsvReportWriter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::tracing_sink::TracingSink;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestRun};
use crate::domain::checkpoint::generate_checkpoints;
use crate::domain::classification::{self, ClassificationReport};
use crate::domain::config_validation::{
    load_backtest_config, load_feature_config, load_rolling_config, load_rolling_schedule,
    validate_backtest_config, validate_feature_config, validate_rolling_config, validate_threshold,
};
use crate::domain::error::CotraderError;
use crate::domain::feature_table::{FeatureTable, LABEL_COLUMN, OVERLAY_COLUMN};
use crate::domain::features::{add_classification_target, build_features};
use crate::domain::model::ModelSpec;
use crate::domain::overlay::{self, OverlayPolicy};
use crate::domain::rolling::{SummaryMetric, run_rolling};
use crate::domain::weekly::filter_market;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "cotrader",
    about = "COT positioning features, classifier training and rolling backtests"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the feature table from a merged COT + price CSV
    Features {
        #[arg(long)]
        merged: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Next-week return a week must beat to be labelled up
        #[arg(long)]
        threshold: Option<f64>,
        /// Keep only rows whose market name contains this text
        #[arg(long)]
        market: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Cross-validate candidate classifiers and write the best as a model file
    Train {
        #[arg(long)]
        features: PathBuf,
        #[arg(long)]
        model_out: PathBuf,
        #[arg(long)]
        splits: Option<usize>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Fit before a date and score classification accuracy after it
    Holdout {
        #[arg(long)]
        features: PathBuf,
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        test_start: NaiveDate,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Retrain once at a test-start date and trade everything after it
    Backtest {
        #[arg(long)]
        features: PathBuf,
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        test_start: NaiveDate,
        #[arg(long)]
        commission: Option<f64>,
        #[arg(long)]
        allow_shorts: bool,
        /// Overlay quantile of the positioning ratio; omit for no overlay
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        charge_flat: bool,
        #[arg(long)]
        overlay_policy: Option<OverlayPolicy>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Retrain at every checkpoint between two dates and summarise each cycle
    Rolling {
        #[arg(long)]
        features: PathBuf,
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Checkpoint spacing, e.g. 6M, 4W or 30D
        #[arg(long)]
        freq: Option<String>,
        /// Comma-separated overlay quantiles; an empty list disables the overlay
        #[arg(long)]
        thresholds: Option<String>,
        #[arg(long)]
        commission: Option<f64>,
        #[arg(long)]
        allow_shorts: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        sequential: bool,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Features {
            merged,
            out,
            threshold,
            market,
            config,
        } => run_features(&merged, &out, threshold, market.as_deref(), config.as_deref()),
        Command::Train {
            features,
            model_out,
            splits,
            config,
        } => run_train(&features, &model_out, splits, config.as_deref()),
        Command::Holdout {
            features,
            model,
            test_start,
            config,
        } => run_holdout(&features, &model, test_start, config.as_deref()),
        Command::Backtest {
            features,
            model,
            test_start,
            commission,
            allow_shorts,
            threshold,
            charge_flat,
            overlay_policy,
            output,
            config,
        } => run_backtest(
            &features,
            &model,
            test_start,
            BacktestOverrides {
                commission,
                allow_shorts,
                charge_flat,
                overlay_policy,
            },
            threshold,
            output.as_deref(),
            config.as_deref(),
        ),
        Command::Rolling {
            features,
            model,
            start,
            end,
            freq,
            thresholds,
            commission,
            allow_shorts,
            output,
            sequential,
            config,
        } => run_rolling_eval(
            &features,
            &model,
            RollingArgs {
                start,
                end,
                freq,
                thresholds,
                sequential,
            },
            BacktestOverrides {
                commission,
                allow_shorts,
                charge_flat: false,
                overlay_policy: None,
            },
            output.as_deref(),
            config.as_deref(),
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the INI file at `path`, or an empty config when none is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, CotraderError> {
    match path {
        Some(p) => FileConfigAdapter::from_file(p),
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn load_model(path: &Path) -> Result<ModelSpec, CotraderError> {
    ModelSpec::from_config(&FileConfigAdapter::from_file(path)?)
}

/// Flags that override `[backtest]` values when given.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktestOverrides {
    pub commission: Option<f64>,
    pub allow_shorts: bool,
    pub charge_flat: bool,
    pub overlay_policy: Option<OverlayPolicy>,
}

impl BacktestOverrides {
    fn apply(&self, config: &mut BacktestConfig) {
        if let Some(c) = self.commission {
            config.commission_per_trade = c;
        }
        config.allow_shorts |= self.allow_shorts;
        config.charge_commission_on_flat |= self.charge_flat;
        if let Some(p) = self.overlay_policy {
            config.overlay_policy = p;
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RollingArgs {
    pub start: Option<String>,
    pub end: Option<String>,
    pub freq: Option<String>,
    pub thresholds: Option<String>,
    pub sequential: bool,
}

/// Feature table with a label column, attaching one from the forward return
/// when the file has none.
fn load_labelled_features(
    path: &Path,
    label_column: &str,
    config: &dyn ConfigPort,
) -> Result<FeatureTable, CotraderError> {
    let table = CsvAdapter::new(path).load_features()?;
    if table.column_index(label_column).is_some() || label_column != LABEL_COLUMN {
        return Ok(table);
    }
    let fc = load_feature_config(config)?;
    add_classification_target(&table, fc.label_threshold)
}

pub fn run_features(
    merged: &Path,
    out: &Path,
    threshold: Option<f64>,
    market: Option<&str>,
    config_path: Option<&Path>,
) -> Result<(), CotraderError> {
    let config = load_config(config_path)?;
    let mut fc = load_feature_config(&config)?;
    if let Some(t) = threshold {
        fc.label_threshold = t;
    }
    validate_feature_config(&fc)?;

    eprintln!("Loading merged data from {}", merged.display());
    let mut records = CsvAdapter::new(merged).load_weekly()?;
    if let Some(m) = market {
        records = filter_market(records, m);
        eprintln!("  {} rows match market '{}'", records.len(), m);
    }

    let table = build_features(&records, &fc, &TracingSink::new("features"))?;
    CsvReportWriter.write_features(&table, out)?;
    eprintln!("Features written to: {}", out.display());
    Ok(())
}

pub fn run_train(
    features: &Path,
    model_out: &Path,
    splits: Option<usize>,
    config_path: Option<&Path>,
) -> Result<(), CotraderError> {
    let config = load_config(config_path)?;
    let bt = load_backtest_config(&config)?;
    let table = load_labelled_features(features, &bt.label_column, &config)?;

    let candidates = match config.get_string("model", "kind") {
        Some(_) => vec![ModelSpec::from_config(&config)?],
        None => classification::default_candidates(),
    };
    let (best, f1) = classification::select_best_model(
        &table,
        &candidates,
        splits,
        &bt.label_column,
        &TracingSink::new("train"),
    )?;

    if let Some(parent) = model_out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(model_out, best.to_ini())?;
    eprintln!("Best model: {} (mean f1 {:.4})", best, f1);
    eprintln!("Model written to: {}", model_out.display());
    Ok(())
}

fn print_report(report: &ClassificationReport) {
    println!("rows:      {}", report.support);
    println!("accuracy:  {:.4}", report.accuracy);
    println!("precision: {:.4}", report.precision);
    println!("recall:    {:.4}", report.recall);
    println!("f1:        {:.4}", report.f1);
}

pub fn run_holdout(
    features: &Path,
    model: &Path,
    test_start: NaiveDate,
    config_path: Option<&Path>,
) -> Result<(), CotraderError> {
    let config = load_config(config_path)?;
    let bt = load_backtest_config(&config)?;
    let spec = load_model(model)?;
    let table = load_labelled_features(features, &bt.label_column, &config)?;

    let report = classification::holdout(
        &table,
        test_start,
        &spec,
        &bt.label_column,
        &TracingSink::new("holdout"),
    )?;
    print_report(&report);
    Ok(())
}

fn print_run(run: &BacktestRun) {
    println!("test start:   {}", run.checkpoint);
    println!("train rows:   {}", run.train_rows);
    println!("weeks traded: {}", run.trades.len());
    println!("cum return:   {:.4}", run.metrics.cum_return);
    println!("sharpe:       {:.3}", run.metrics.sharpe);
    println!("sortino:      {:.3}", run.metrics.sortino);
    println!("max drawdown: {:.4}", run.metrics.max_drawdown);
    if let Some(p) = run.pending {
        println!("pending:      {} signal {}", p.week, p.signal);
    }
}

pub fn run_backtest(
    features: &Path,
    model: &Path,
    test_start: NaiveDate,
    overrides: BacktestOverrides,
    threshold: Option<f64>,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<(), CotraderError> {
    let config = load_config(config_path)?;
    let rolling = load_rolling_config(&config)?;
    let mut bt = rolling.backtest;
    overrides.apply(&mut bt);
    validate_backtest_config(&bt)?;
    if let Some(q) = threshold {
        validate_threshold(q)?;
    }

    let spec = load_model(model)?;
    let mut table = load_labelled_features(features, &bt.label_column, &config)?;
    if let Some(q) = threshold {
        let flagged = overlay::flag_extremes(&table, &rolling.ratio_column, q)?;
        let flags = flagged.column(OVERLAY_COLUMN)?;
        table = flagged.with_column(&bt.overlay_column, &flags)?;
    }

    let run = backtest_engine::run_backtest(
        &table,
        test_start,
        &spec,
        &bt,
        &TracingSink::new("backtest"),
    )?;
    if let Some(out) = output {
        CsvReportWriter.write_trades(&run, out)?;
        eprintln!("Trades written to: {}", out.display());
    }
    print_run(&run);
    Ok(())
}

fn print_summary(rows: &[SummaryMetric]) {
    let cell = |v: f64| {
        if v.is_nan() {
            "-".to_string()
        } else {
            format!("{:.4}", v)
        }
    };
    println!(
        "{:>9}  {:<10}  {:>10}  {:>8}  {:>12}",
        "threshold", "test_start", "cum_return", "sharpe", "max_drawdown"
    );
    for r in rows {
        println!(
            "{:>9}  {:<10}  {:>10}  {:>8}  {:>12}",
            r.threshold.map(|q| q.to_string()).unwrap_or_default(),
            r.test_start,
            cell(r.cum_return),
            cell(r.sharpe),
            cell(r.max_drawdown)
        );
    }
}

pub fn run_rolling_eval(
    features: &Path,
    model: &Path,
    args: RollingArgs,
    overrides: BacktestOverrides,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<(), CotraderError> {
    let config = load_config(config_path)?;
    let mut rolling = load_rolling_config(&config)?;
    overrides.apply(&mut rolling.backtest);
    if args.sequential {
        rolling.parallel = false;
    }
    validate_rolling_config(&rolling)?;
    let schedule = load_rolling_schedule(
        &config,
        args.start.as_deref(),
        args.end.as_deref(),
        args.freq.as_deref(),
        args.thresholds.as_deref(),
    )?;

    let spec = load_model(model)?;
    let table = load_labelled_features(features, &rolling.backtest.label_column, &config)?;
    let checkpoints = generate_checkpoints(schedule.start, schedule.end, schedule.freq);
    eprintln!(
        "Evaluating {} checkpoints x {} thresholds with {}",
        checkpoints.len(),
        schedule.thresholds.len().max(1),
        spec
    );

    let rows = run_rolling(
        &table,
        &spec,
        &checkpoints,
        &schedule.thresholds,
        &rolling,
        &TracingSink::new("rolling"),
    )?;
    if let Some(out) = output {
        CsvReportWriter.write_summary(&rows, out)?;
        eprintln!("Summary written to: {}", out.display());
    }
    print_summary(&rows);
    Ok(())
}
