//! Data Processor Module
//! Reshapes the wide power table and merges it with the air-quality table.

use crate::config::{DATE_COL, GENERATION_COL, MONTH_COL, YEAR_COL};
use crate::data::loader::{clean_number, DataLoader};
use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Handles the reshape and merge steps between loading and modelling.
pub struct DataProcessor;

impl DataProcessor {
    /// Transform the wide power table to long format (unpivot).
    ///
    /// Every column other than `month` is treated as a year label.
    /// Output columns: ["year", "month", "generation"], one row per cell,
    /// ordered year-column by year-column. Null cells are kept.
    pub fn unpivot_power(wide: &DataFrame) -> Result<DataFrame> {
        let month_col = wide
            .column(MONTH_COL)
            .map_err(|_| PipelineError::missing_column("power table", MONTH_COL))?;
        let month_i32 = month_col.strict_cast(&DataType::Int32)?;
        let month_ca = month_i32.i32()?;

        let year_cols: Vec<&Column> = wide
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() != MONTH_COL)
            .collect();
        if year_cols.is_empty() {
            return Err(PipelineError::EmptyPowerTable);
        }

        let capacity = year_cols.len() * wide.height();
        let mut years: Vec<i32> = Vec::with_capacity(capacity);
        let mut months: Vec<Option<i32>> = Vec::with_capacity(capacity);
        let mut values: Vec<Option<f64>> = Vec::with_capacity(capacity);

        for column in year_cols {
            let year = parse_year_label(column.name().as_str())?;
            let value_f64 = column.cast(&DataType::Float64)?;
            let value_ca = value_f64.f64()?;

            for (month, value) in month_ca.into_iter().zip(value_ca.into_iter()) {
                years.push(year);
                months.push(month);
                values.push(value.filter(|v| !v.is_nan()));
            }
        }

        let df = DataFrame::new(vec![
            Column::new(YEAR_COL.into(), years),
            Column::new(MONTH_COL.into(), months),
            Column::new(GENERATION_COL.into(), values),
        ])?;

        info!("Unpivoted power table to {} year-month rows", df.height());
        Ok(df)
    }

    /// Inner-join air quality and long-format power on (year, month).
    ///
    /// Year-months present in only one table are dropped. The output is
    /// sorted chronologically and gains a leading `date` column holding the
    /// first day of each month.
    pub fn merge(air: &DataFrame, power_long: &DataFrame) -> Result<DataFrame> {
        let air = DataLoader::normalize_keys(air.clone(), "air-quality table")?;
        let power_long = DataLoader::normalize_keys(power_long.clone(), "power table")?;

        let air_keys = Self::key_pairs(&air)?;
        let power_keys = Self::key_pairs(&power_long)?;
        warn_on_duplicate_keys("air-quality table", &air_keys);
        warn_on_duplicate_keys("power table", &power_keys);

        let keys = [col(YEAR_COL), col(MONTH_COL)];
        let joined = air
            .lazy()
            .join(
                power_long.lazy(),
                keys.clone(),
                keys,
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        let mut merged = joined.sort([YEAR_COL, MONTH_COL], SortMultipleOptions::default())?;

        let dates = Self::key_pairs(&merged)?
            .into_iter()
            .map(|(year, month)| first_of_month_days(year, month))
            .collect::<Result<Vec<i32>>>()?;
        let date_col = Column::new(DATE_COL.into(), dates).cast(&DataType::Date)?;
        if merged.get_column_index(DATE_COL).is_some() {
            merged.drop_in_place(DATE_COL)?;
        }
        merged.insert_column(0, date_col)?;

        let air_only = unmatched(&air_keys, &power_keys);
        let power_only = unmatched(&power_keys, &air_keys);
        info!(
            "Merged {} rows ({} air-quality-only and {} power-only months dropped)",
            merged.height(),
            air_only,
            power_only
        );
        Ok(merged)
    }

    /// Write the merged table as UTF-8 CSV with a byte-order mark.
    pub fn write_merged_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        let mut file = File::create(path).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
        file.write_all(UTF8_BOM)
            .map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        info!("Wrote merged table to {}", path.display());
        Ok(())
    }

    /// (year, month) of every row; nulls in either key are reported as missing keys.
    pub fn key_pairs(df: &DataFrame) -> Result<Vec<(i32, i32)>> {
        let year = df.column(YEAR_COL)?.strict_cast(&DataType::Int32)?;
        let month = df.column(MONTH_COL)?.strict_cast(&DataType::Int32)?;

        year.i32()?
            .into_iter()
            .zip(month.i32()?.into_iter())
            .map(|pair| match pair {
                (Some(y), Some(m)) => Ok((y, m)),
                (None, _) => Err(PipelineError::TypeConversion {
                    what: YEAR_COL.to_string(),
                    value: "null".to_string(),
                }),
                (_, None) => Err(PipelineError::TypeConversion {
                    what: MONTH_COL.to_string(),
                    value: "null".to_string(),
                }),
            })
            .collect()
    }
}

/// Convert a power-table header such as "2020" into a year.
pub fn parse_year_label(label: &str) -> Result<i32> {
    clean_number(label)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| PipelineError::TypeConversion {
            what: "year column".to_string(),
            value: label.to_string(),
        })
}

/// Days since 1970-01-01 for the first day of the given month.
fn first_of_month_days(year: i32, month: i32) -> Result<i32> {
    let invalid = || PipelineError::InvalidMonth(month as i64);
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(invalid)?;
    Ok(date.signed_duration_since(epoch).num_days() as i32)
}

fn unmatched(keys: &[(i32, i32)], other: &[(i32, i32)]) -> usize {
    let other: HashSet<&(i32, i32)> = other.iter().collect();
    let keys: HashSet<&(i32, i32)> = keys.iter().collect();
    keys.difference(&other).count()
}

// Duplicate keys multiply rows in the join; this is left undefined and only flagged.
fn warn_on_duplicate_keys(table: &str, keys: &[(i32, i32)]) {
    let unique: HashSet<&(i32, i32)> = keys.iter().collect();
    if unique.len() != keys.len() {
        warn!(
            "{} has {} duplicate (year, month) keys; merged rows will be multiplied",
            table,
            keys.len() - unique.len()
        );
    }
}
