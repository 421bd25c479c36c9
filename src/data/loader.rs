//! Table Loader Module
//! Reads the air-quality averages and the wide power-generation table using Polars.

use crate::config::{AirQualitySource, MONTH_COL, YEAR_COL};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const AIR_TABLE: &str = "air-quality table";

/// Loads the two input tables and normalises their key columns.
pub struct DataLoader;

impl DataLoader {
    /// Load monthly national air-quality averages.
    ///
    /// The result always carries `year` and `month` as `Int32`; every other
    /// column is passed through untouched.
    pub fn load_air_quality(source: &AirQualitySource) -> Result<DataFrame> {
        let df = match source {
            AirQualitySource::Csv(path) => {
                info!("Loading air-quality CSV {}", path.display());
                Self::read_csv(path)?
            }
            AirQualitySource::ParquetDir(dir) => {
                info!("Loading air-quality parquet partitions from {}", dir.display());
                Self::read_parquet_dir(dir)?
            }
        };

        let df = Self::normalize_keys(df, AIR_TABLE)?;
        info!("Air-quality table: {} rows x {} columns", df.height(), df.width());
        Ok(df)
    }

    /// Load the wide power table (one row per month, one column per year).
    ///
    /// The first column is renamed to `month` and parsed as `Int32`; rows
    /// without a valid month label are dropped. Every other column keeps its
    /// header and is converted to `Float64` after stripping thousands
    /// separators. Blank cells become nulls.
    pub fn load_power_wide(path: &Path) -> Result<DataFrame> {
        Self::ensure_exists(path)?;
        info!("Loading power CSV {}", path.display());

        // Schema inference is disabled so that "12,345" survives as text.
        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        if raw.width() < 2 || raw.height() == 0 {
            return Err(PipelineError::EmptyPowerTable);
        }

        let names: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let (months, keep) = Self::parse_month_labels(raw.column(&names[0])?)?;
        let raw = raw.filter(&BooleanChunked::from_slice("keep".into(), &keep))?;
        if raw.height() == 0 {
            return Err(PipelineError::EmptyPowerTable);
        }

        let mut columns = Vec::with_capacity(names.len());
        columns.push(Column::new(MONTH_COL.into(), months));

        for name in &names[1..] {
            let text = raw.column(name)?.cast(&DataType::String)?;
            let values = text
                .str()?
                .into_iter()
                .map(|cell| Self::parse_generation(cell, name))
                .collect::<Result<Vec<Option<f64>>>>()?;
            columns.push(Column::new(name.as_str().into(), values));
        }

        let df = DataFrame::new(columns)?;
        debug!("Power table has {} year columns", df.width() - 1);
        Ok(df)
    }

    fn read_csv(path: &Path) -> Result<DataFrame> {
        Self::ensure_exists(path)?;
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;
        Ok(df)
    }

    fn read_parquet_dir(dir: &Path) -> Result<DataFrame> {
        if !dir.is_dir() {
            return Err(PipelineError::FileNotFound(dir.to_path_buf()));
        }

        let files = Self::partition_files(dir)?;
        if files.is_empty() {
            return Err(PipelineError::NoPartitionFiles(dir.to_path_buf()));
        }
        debug!("Found {} parquet partitions", files.len());

        let frames = files
            .iter()
            .map(|file| LazyFrame::scan_parquet(file, ScanArgsParquet::default()))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(concat(frames, UnionArgs::default())?.collect()?)
    }

    /// Sorted list of `*.parquet` files directly under `dir`.
    pub fn partition_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let pattern = dir.join("*.parquet").to_string_lossy().to_string();
        let paths = glob::glob(&pattern)
            .map_err(|e| PipelineError::GlobPattern(pattern.clone(), e))?;

        let mut files: Vec<PathBuf> = paths.filter_map(|entry| entry.ok()).collect();
        files.sort();
        Ok(files)
    }

    /// Check for `year` and `month` and cast both to `Int32`.
    pub fn normalize_keys(mut df: DataFrame, table: &str) -> Result<DataFrame> {
        for key in [YEAR_COL, MONTH_COL] {
            if df.get_column_index(key).is_none() {
                return Err(PipelineError::missing_column(table, key));
            }
            let casted = df.column(key)?.strict_cast(&DataType::Int32)?;
            df.with_column(casted)?;
        }
        Ok(df)
    }

    /// Month numbers of the valid rows, plus a keep-mask over all rows.
    ///
    /// Rows whose label is not a month in 1..=12 (a totals row, say) are
    /// skipped with a warning; they would never match the join anyway.
    fn parse_month_labels(column: &Column) -> Result<(Vec<i32>, Vec<bool>)> {
        let text = column.cast(&DataType::String)?;
        let mut months = Vec::with_capacity(text.len());
        let mut keep = Vec::with_capacity(text.len());

        for (row, cell) in text.str()?.into_iter().enumerate() {
            let raw = cell.unwrap_or("");
            let month = clean_number(raw)
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|m| (1..=12).contains(m));
            match month {
                Some(m) => {
                    months.push(m as i32);
                    keep.push(true);
                }
                None => {
                    warn!("Skipping power row {} with month label {:?}", row + 1, raw);
                    keep.push(false);
                }
            }
        }
        Ok((months, keep))
    }

    fn parse_generation(cell: Option<&str>, year_label: &str) -> Result<Option<f64>> {
        let Some(raw) = cell else {
            return Ok(None);
        };
        let Some(cleaned) = clean_number(raw) else {
            return Ok(None);
        };
        if cleaned.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }
        cleaned
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PipelineError::TypeConversion {
                what: format!("generation for {}", year_label),
                value: raw.to_string(),
            })
    }

    fn ensure_exists(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(PipelineError::FileNotFound(path.to_path_buf()))
        }
    }
}

/// Strip thousands separators and surrounding whitespace; `None` if nothing is left.
pub fn clean_number(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
