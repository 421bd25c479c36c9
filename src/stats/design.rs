//! Regression frame construction: lagged generation, month dummies and trend.

use crate::config::{GENERATION_COL, MONTH_COL, YEAR_COL};
use crate::data::DataProcessor;
use crate::error::{PipelineError, Result};
use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const TREND_COL: &str = "trend";
pub const CONST_NAME: &str = "const";

/// Name of the lagged generation regressor, e.g. `generation_lag1`.
pub fn lag_column_name(lag: usize) -> String {
    format!("{}_lag{}", GENERATION_COL, lag)
}

/// Name of the indicator column for a calendar month, e.g. `month_7`.
pub fn dummy_column_name(month: i32) -> String {
    format!("{}_{}", MONTH_COL, month)
}

/// Merged table plus the regressors, restricted to complete rows.
#[derive(Debug, Clone)]
pub struct RegressionFrame {
    pub frame: DataFrame,
    pub target: String,
    /// Regressor names in design order, intercept excluded.
    pub regressors: Vec<String>,
    pub reference_month: Option<i32>,
    pub total_rows: usize,
    pub dropped_rows: usize,
}

/// Dense design for the OLS solver. Column 0 of `x` is the intercept.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    pub names: Vec<String>,
}

impl RegressionFrame {
    /// Build the regression frame from the merged, chronologically sorted table.
    ///
    /// The trend index and the lag are assigned over every merged row before
    /// incomplete rows are removed, so the first `lag` rows always drop out.
    /// A row is incomplete when any merged column or the lag is missing.
    pub fn build(merged: &DataFrame, target: &str, lag: usize) -> Result<Self> {
        if lag == 0 {
            return Err(PipelineError::InvalidLag(lag));
        }
        for required in [target, GENERATION_COL] {
            if merged.get_column_index(required).is_none() {
                return Err(PipelineError::missing_column("merged table", required));
            }
        }

        let sorted = merged.sort([YEAR_COL, MONTH_COL], SortMultipleOptions::default())?;
        let n = sorted.height();
        let keys = DataProcessor::key_pairs(&sorted)?;

        let target_values = finite_values(&sorted, target)?;
        let generation = finite_values(&sorted, GENERATION_COL)?;

        let lag_name = lag_column_name(lag);
        let lagged: Vec<Option<f64>> = (0..n)
            .map(|i| if i >= lag { generation[i - lag] } else { None })
            .collect();
        let trend: Vec<i64> = (0..n as i64).collect();

        let categories: BTreeSet<i32> = keys.iter().map(|(_, month)| *month).collect();
        let reference_month = categories.iter().next().copied();

        let mut columns = vec![
            Column::new(YEAR_COL.into(), keys.iter().map(|k| k.0).collect::<Vec<i32>>()),
            Column::new(MONTH_COL.into(), keys.iter().map(|k| k.1).collect::<Vec<i32>>()),
            Column::new(target.into(), target_values),
            Column::new(lag_name.as_str().into(), lagged.clone()),
            Column::new(TREND_COL.into(), trend),
        ];
        let mut regressors = vec![lag_name, TREND_COL.to_string()];

        for month in categories.iter().skip(1) {
            let name = dummy_column_name(*month);
            let indicator: Vec<f64> = keys
                .iter()
                .map(|(_, m)| if m == month { 1.0 } else { 0.0 })
                .collect();
            columns.push(Column::new(name.as_str().into(), indicator));
            regressors.push(name);
        }

        // A row survives only if every merged column and the lag are present.
        let complete: Vec<bool> = present_rows(&sorted)?
            .into_iter()
            .zip(lagged.iter())
            .map(|(row, x)| row && x.is_some())
            .collect();
        let mask = BooleanChunked::from_slice("complete".into(), &complete);
        let frame = DataFrame::new(columns)?.filter(&mask)?;

        let dropped_rows = n - frame.height();
        info!(
            "Regression frame: {} of {} rows complete ({} dropped), {} regressors",
            frame.height(),
            n,
            dropped_rows,
            regressors.len()
        );
        debug!("Reference month for dummies: {:?}", reference_month);

        Ok(Self {
            frame,
            target: target.to_string(),
            regressors,
            reference_month,
            total_rows: n,
            dropped_rows,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.frame.height()
    }

    /// Names of the month indicator columns.
    pub fn dummy_columns(&self) -> Vec<&str> {
        self.regressors
            .iter()
            .map(|s| s.as_str())
            .filter(|s| s.starts_with(&format!("{}_", MONTH_COL)))
            .collect()
    }

    /// (year, month) of the first and last observation used.
    pub fn sample_range(&self) -> Result<Option<((i32, i32), (i32, i32))>> {
        let keys = DataProcessor::key_pairs(&self.frame)?;
        Ok(keys.first().copied().zip(keys.last().copied()))
    }

    /// Response vector and design matrix with a leading intercept column.
    pub fn design(&self) -> Result<Design> {
        let y = DVector::from_vec(column_f64(&self.frame, &self.target)?);

        let mut names = vec![CONST_NAME.to_string()];
        let mut data = vec![1.0; self.n_obs()];
        for name in &self.regressors {
            data.extend(column_f64(&self.frame, name)?);
            names.push(name.clone());
        }

        // nalgebra storage is column-major, matching the push order above.
        let x = DMatrix::from_vec(self.n_obs(), names.len(), data);
        Ok(Design { x, y, names })
    }
}

/// Per row, whether no column holds a null (or a NaN, for float columns).
fn present_rows(df: &DataFrame) -> Result<Vec<bool>> {
    let mut present = vec![true; df.height()];
    for column in df.get_columns() {
        if column.dtype().is_float() {
            for (row, v) in finite_values(df, column.name())?.into_iter().enumerate() {
                present[row] &= v.is_some();
            }
        } else {
            let nulls = column.as_materialized_series().is_null();
            for (row, v) in nulls.into_iter().enumerate() {
                present[row] &= !v.unwrap_or(true);
            }
        }
    }
    Ok(present)
}

/// Column as `f64` with NaN folded into null.
fn finite_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(years: &[i32]) -> DataFrame {
        let mut year = Vec::new();
        let mut month = Vec::new();
        let mut pm10 = Vec::new();
        let mut generation = Vec::new();
        for &y in years {
            for m in 1..=12 {
                year.push(y);
                month.push(m);
                pm10.push(30.0 + m as f64);
                generation.push(1000.0 * (y - 2000) as f64 + m as f64);
            }
        }
        df!(
            "year" => year,
            "month" => month,
            "national_avg_PM10" => pm10,
            "generation" => generation
        )
        .unwrap()
    }

    #[test]
    fn lag_shifts_generation_by_one_row() {
        let rf = RegressionFrame::build(&merged(&[2020, 2021]), "national_avg_PM10", 1).unwrap();

        assert_eq!(rf.total_rows, 24);
        assert_eq!(rf.n_obs(), 23);
        assert_eq!(rf.dropped_rows, 1);

        // First remaining row is 2020-02 and carries 2020-01 generation.
        let range = rf.sample_range().unwrap().unwrap();
        assert_eq!(range, ((2020, 2), (2021, 12)));
        let lag = rf.frame.column("generation_lag1").unwrap().f64().unwrap();
        assert_eq!(lag.get(0), Some(20001.0));
        assert_eq!(lag.get(11), Some(20012.0)); // 2021-01 row carries 2020-12
    }

    #[test]
    fn trend_is_assigned_before_dropping() {
        let rf = RegressionFrame::build(&merged(&[2020]), "national_avg_PM10", 2).unwrap();
        let trend = rf.frame.column("trend").unwrap().i64().unwrap();
        assert_eq!(trend.get(0), Some(2));
        assert_eq!(rf.n_obs(), 10);
    }

    #[test]
    fn eleven_dummies_with_at_most_one_hot() {
        let rf = RegressionFrame::build(&merged(&[2020, 2021]), "national_avg_PM10", 1).unwrap();
        let dummies = rf.dummy_columns();

        assert_eq!(dummies.len(), 11);
        assert_eq!(rf.reference_month, Some(1));
        assert!(!dummies.contains(&"month_1"));

        for row in 0..rf.n_obs() {
            let hot: f64 = dummies
                .iter()
                .map(|d| rf.frame.column(d).unwrap().f64().unwrap().get(row).unwrap())
                .sum();
            assert!(hot <= 1.0);
        }
        // 2021-01 is the reference month: all zeros.
        let jan_row = 11;
        for d in &dummies {
            assert_eq!(rf.frame.column(d).unwrap().f64().unwrap().get(jan_row), Some(0.0));
        }
    }

    #[test]
    fn missing_target_rows_are_dropped() {
        let mut df = merged(&[2020]);
        let pm10: Vec<Option<f64>> = (1..=12)
            .map(|m| if m == 6 { None } else { Some(m as f64) })
            .collect();
        df.with_column(Column::new("national_avg_PM10".into(), pm10)).unwrap();

        let rf = RegressionFrame::build(&df, "national_avg_PM10", 1).unwrap();
        assert_eq!(rf.n_obs(), 10);
        assert_eq!(rf.dropped_rows, 2);
    }

    #[test]
    fn rows_missing_generation_or_another_pollutant_are_dropped() {
        let mut df = merged(&[2020, 2021]);
        // 2020-06 has no generation, 2021-03 has no NO2.
        let generation: Vec<Option<f64>> = df
            .column("generation")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, v)| if i == 5 { None } else { v })
            .collect();
        let no2: Vec<Option<f64>> = (0..24)
            .map(|i| if i == 14 { None } else { Some(20.0 + i as f64) })
            .collect();
        df.with_column(Column::new("generation".into(), generation)).unwrap();
        df.with_column(Column::new("national_avg_NO2".into(), no2)).unwrap();

        let rf = RegressionFrame::build(&df, "national_avg_PM10", 1).unwrap();

        // 2020-01 (lag), 2020-06, 2020-07 (lag of 06) and 2021-03 drop out.
        assert_eq!(rf.n_obs(), 20);
        assert_eq!(rf.dropped_rows, 4);
        let keys = DataProcessor::key_pairs(&rf.frame).unwrap();
        for gone in [(2020, 1), (2020, 6), (2020, 7), (2021, 3)] {
            assert!(!keys.contains(&gone), "{gone:?} should be dropped");
        }
        assert_eq!(rf.dummy_columns().len(), 11);
    }

    #[test]
    fn design_has_intercept_first() {
        let rf = RegressionFrame::build(&merged(&[2020, 2021]), "national_avg_PM10", 1).unwrap();
        let design = rf.design().unwrap();

        assert_eq!(design.names[0], "const");
        assert_eq!(design.names[1], "generation_lag1");
        assert_eq!(design.names[2], "trend");
        assert_eq!(design.x.ncols(), 14);
        assert_eq!(design.x.nrows(), 23);
        assert_eq!(design.y.len(), 23);
        assert!(design.x.column(0).iter().all(|v| *v == 1.0));
        assert_eq!(design.x[(0, 2)], 1.0);
    }

    #[test]
    fn unknown_target_and_zero_lag_are_rejected() {
        let df = merged(&[2020]);
        assert!(matches!(
            RegressionFrame::build(&df, "national_avg_SO2", 1),
            Err(PipelineError::MissingColumn { .. })
        ));
        assert!(matches!(
            RegressionFrame::build(&df, "national_avg_PM10", 0),
            Err(PipelineError::InvalidLag(0))
        ));
    }
}
