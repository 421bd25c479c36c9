//! The two runs: merge-and-save, and merge-correlate-regress.

use crate::charts::HeatmapRenderer;
use crate::config::{PipelineConfig, GENERATION_COL};
use crate::data::{DataLoader, DataProcessor};
use crate::error::{PipelineError, Result};
use crate::stats::{CorrelationMatrix, OlsModel, OlsResults, RegressionFrame, StatsCalculator};
use polars::prelude::DataFrame;
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub rows: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub correlations: Vec<(String, f64)>,
    pub results: OlsResults,
    pub summary: String,
    pub summary_path: PathBuf,
    pub coefficients_path: PathBuf,
    pub heatmap_path: PathBuf,
}

/// Load both sources, reshape the power table and inner-join on (year, month).
#[instrument(skip_all)]
pub fn prepare_data(config: &PipelineConfig) -> Result<DataFrame> {
    info!("Join policy: {:?}", config.join_policy);
    let air = DataLoader::load_air_quality(&config.air_quality)?;
    let power_wide = DataLoader::load_power_wide(&config.power_csv)?;
    let power_long = DataProcessor::unpivot_power(&power_wide)?;
    DataProcessor::merge(&air, &power_long)
}

/// Build the regression frame from the merged table and fit OLS.
pub fn fit_model(merged: &DataFrame, config: &PipelineConfig) -> Result<(RegressionFrame, OlsResults)> {
    let frame = RegressionFrame::build(merged, &config.target, config.lag)?;
    let design = frame.design()?;
    let mut results = OlsModel::fit(&design, &config.target)?;
    if let Some(((y0, m0), (y1, m1))) = frame.sample_range()? {
        results = results.with_sample(format!("{y0}-{m0:02} - {y1}-{m1:02}"));
    }
    Ok((frame, results))
}

/// Correlations between every pollutant column and generation.
pub fn correlations(merged: &DataFrame) -> Result<CorrelationMatrix> {
    let columns = StatsCalculator::analysis_columns(merged);
    StatsCalculator::correlation_matrix(merged, &columns)
}

/// Merge run: write the unified table as CSV.
#[instrument(skip_all)]
pub fn run_merge(config: &PipelineConfig) -> Result<MergeReport> {
    let mut merged = prepare_data(config)?;
    create_output_dir(config)?;

    let path = config.merged_csv_path();
    DataProcessor::write_merged_csv(&mut merged, &path)?;
    Ok(MergeReport {
        rows: merged.height(),
        path,
    })
}

/// Analysis run: OLS fit, text summary, JSON coefficients and correlation heatmap.
///
/// The regression outputs are written before the heatmap so that a chart
/// failure still leaves them on disk.
#[instrument(skip_all)]
pub fn run_analysis(config: &PipelineConfig) -> Result<AnalysisReport> {
    let merged = prepare_data(config)?;
    create_output_dir(config)?;

    let (_, results) = fit_model(&merged, config)?;
    let (summary_path, coefficients_path) = write_regression_outputs(&results, config)?;

    let matrix = correlations(&merged)?;
    let heatmap_path = config.heatmap_path();
    HeatmapRenderer::render_png(&matrix, &heatmap_path)?;

    Ok(AnalysisReport {
        correlations: matrix.ranking(GENERATION_COL),
        summary: results.summary(),
        results,
        summary_path,
        coefficients_path,
        heatmap_path,
    })
}

/// Write the text summary and the JSON coefficients; returns both paths.
pub fn write_regression_outputs(
    results: &OlsResults,
    config: &PipelineConfig,
) -> Result<(PathBuf, PathBuf)> {
    let summary_path = config.summary_path();
    results.write_summary(&summary_path)?;
    let coefficients_path = config.coefficients_path();
    results.write_json(&coefficients_path)?;
    info!("Wrote regression summary to {}", summary_path.display());
    Ok((summary_path, coefficients_path))
}

fn create_output_dir(config: &PipelineConfig) -> Result<()> {
    let dir = config.output_dir();
    fs::create_dir_all(dir).map_err(|e| PipelineError::Io(dir.to_path_buf(), e))
}
