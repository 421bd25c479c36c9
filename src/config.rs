//! Run configuration and the fixed names the pipeline relies on.

use std::path::{Path, PathBuf};

/// Lag (in months) applied to generation before it enters the regression.
pub const DEFAULT_LAG: usize = 1;

/// Pollutant used as the dependent variable unless overridden.
pub const DEFAULT_TARGET: &str = "national_avg_PM10";

pub const YEAR_COL: &str = "year";
pub const MONTH_COL: &str = "month";
pub const DATE_COL: &str = "date";
pub const GENERATION_COL: &str = "generation";
pub const POLLUTANT_PREFIX: &str = "national_avg_";

pub const MERGED_CSV_NAME: &str = "unified_national_merged_data.csv";
pub const HEATMAP_NAME: &str = "correlation_heatmap.png";

/// Where the monthly national air-quality averages come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirQualitySource {
    /// A single CSV that is already averaged per month.
    Csv(PathBuf),
    /// A directory of `*.parquet` partitions to be concatenated.
    ParquetDir(PathBuf),
}

/// How months missing from one of the sources are handled.
///
/// Only inner-join semantics exist: a year-month present in just one table is
/// dropped, never imputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    #[default]
    InnerDropPartialMonths,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub air_quality: AirQualitySource,
    pub power_csv: PathBuf,
    pub output_dir: PathBuf,
    pub target: String,
    pub lag: usize,
    pub join_policy: JoinPolicy,
}

impl PipelineConfig {
    pub fn new(air_quality: AirQualitySource, power_csv: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            air_quality,
            power_csv,
            output_dir,
            target: DEFAULT_TARGET.to_string(),
            lag: DEFAULT_LAG,
            join_policy: JoinPolicy::default(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }

    /// Target name without the `national_avg_` prefix, e.g. `PM10`.
    pub fn pollutant_label(&self) -> &str {
        self.target
            .strip_prefix(POLLUTANT_PREFIX)
            .unwrap_or(&self.target)
    }

    pub fn merged_csv_path(&self) -> PathBuf {
        self.output_dir.join(MERGED_CSV_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("regression_summary_{}.txt", self.pollutant_label()))
    }

    pub fn coefficients_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("regression_coefficients_{}.json", self.pollutant_label()))
    }

    pub fn heatmap_path(&self) -> PathBuf {
        self.output_dir.join(HEATMAP_NAME)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_use_pollutant_label() {
        let config = PipelineConfig::new(
            AirQualitySource::Csv(PathBuf::from("air.csv")),
            PathBuf::from("power.csv"),
            PathBuf::from("out"),
        );

        assert_eq!(config.lag, DEFAULT_LAG);
        assert_eq!(config.pollutant_label(), "PM10");
        assert_eq!(
            config.summary_path(),
            PathBuf::from("out").join("regression_summary_PM10.txt")
        );

        let config = config.with_target("national_avg_NO2").with_lag(2);
        assert_eq!(config.lag, 2);
        assert_eq!(
            config.coefficients_path(),
            PathBuf::from("out").join("regression_coefficients_NO2.json")
        );
    }

    #[test]
    fn label_falls_back_to_full_name() {
        let config = PipelineConfig::new(
            AirQualitySource::ParquetDir(PathBuf::from("parts")),
            PathBuf::from("power.csv"),
            PathBuf::from("out"),
        )
        .with_target("pm10");
        assert_eq!(config.pollutant_label(), "pm10");
    }
}
