//! airgen - merge air-quality and thermal power series, then fit the lagged OLS model.

use airgen::config::{DEFAULT_LAG, DEFAULT_TARGET};
use airgen::pipeline::{self, AnalysisReport, MergeReport};
use airgen::{AirQualitySource, PipelineConfig};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Air quality vs. thermal power generation analysis",
    long_about = "Merges monthly national air-quality averages with monthly thermal power \
                  generation and fits an OLS model of a pollutant on lagged generation, \
                  a linear trend and month dummies.\n\n\
                  Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge both sources and write the unified CSV
    Merge {
        #[command(flatten)]
        inputs: InputArgs,
    },
    /// Merge, then write the correlation heatmap and the regression summary
    Analyze {
        #[command(flatten)]
        inputs: InputArgs,

        /// Pollutant column used as the dependent variable
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,

        /// Lag in months applied to generation
        #[arg(long, default_value_t = DEFAULT_LAG)]
        lag: usize,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    #[command(flatten)]
    air: AirArgs,

    /// Wide power-generation CSV (first column month, one column per year)
    #[arg(long)]
    power_csv: PathBuf,

    /// Directory for all outputs
    #[arg(short, long, default_value = "./analysis_results")]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct AirArgs {
    /// Monthly national air-quality CSV
    #[arg(long)]
    air_csv: Option<PathBuf>,

    /// Directory of air-quality parquet partitions
    #[arg(long)]
    air_parquet_dir: Option<PathBuf>,
}

impl InputArgs {
    fn into_config(self) -> Result<PipelineConfig> {
        let source = match (self.air.air_csv, self.air.air_parquet_dir) {
            (Some(csv), _) => AirQualitySource::Csv(csv),
            (None, Some(dir)) => AirQualitySource::ParquetDir(dir),
            (None, None) => bail!("one of --air-csv or --air-parquet-dir is required"),
        };
        Ok(PipelineConfig::new(source, self.power_csv, self.output_dir))
    }
}

fn main() -> ExitCode {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\nPipeline failed: {:#}", e);
            eprintln!("Check that the input file paths and file names are correct.");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Merge { inputs } => {
            let config = inputs.into_config()?;
            let report = pipeline::run_merge(&config).context("merge run failed")?;
            print_merge(&report);
        }
        Command::Analyze { inputs, target, lag } => {
            let config = inputs.into_config()?.with_target(target).with_lag(lag);
            let report = pipeline::run_analysis(&config).context("analysis run failed")?;
            print_analysis(&report);
        }
    }
    Ok(())
}

fn print_merge(report: &MergeReport) {
    println!(
        "\nMerge complete: {} rows written to {}",
        report.rows,
        report.path.display()
    );
}

fn print_analysis(report: &AnalysisReport) {
    println!("\nCorrelation with generation:");
    for (name, r) in &report.correlations {
        println!("  {:<28}{:>8.3}", name, r);
    }
    println!("-> Heatmap saved: {}", report.heatmap_path.display());

    println!("\n{}", report.summary);
    println!(
        "Analysis complete. Summary saved to {} (coefficients: {})",
        report.summary_path.display(),
        report.coefficients_path.display()
    );
}
