//! Statistics Calculator Module
//! Pearson correlations between the pollutant series and generation.

use crate::config::{GENERATION_COL, POLLUTANT_PREFIX};
use crate::error::Result;
use polars::prelude::*;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Square correlation matrix with matching row and column labels.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.values[i][j])
    }

    /// Correlations of every series with `label` (itself included), strongest positive first.
    pub fn ranking(&self, label: &str) -> Vec<(String, f64)> {
        let Some(i) = self.labels.iter().position(|l| l == label) else {
            return Vec::new();
        };

        let mut ranked: Vec<(String, f64)> = self
            .labels
            .iter()
            .zip(self.values[i].iter())
            .map(|(l, v)| (l.clone(), *v))
            .collect();
        // NaN sorts last.
        ranked.sort_by(|a, b| match (a.1.is_nan(), b.1.is_nan()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
        });
        ranked
    }
}

/// Handles correlation calculations with multi-threading support.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Columns that enter the correlation analysis: all pollutants plus generation.
    pub fn analysis_columns(df: &DataFrame) -> Vec<String> {
        df.get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| name.starts_with(POLLUTANT_PREFIX) || name == GENERATION_COL)
            .collect()
    }

    /// Pearson correlation of every pair of `columns`, using pairwise-complete rows.
    pub fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<CorrelationMatrix> {
        let series: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|name| {
                let values = df.column(name)?.cast(&DataType::Float64)?;
                Ok(values
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect())
            })
            .collect::<Result<_>>()?;

        // Use rayon for parallel computation
        let values = (0..series.len())
            .into_par_iter()
            .map(|i| {
                (0..series.len())
                    .map(|j| Self::pearson(&series[i], &series[j]))
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<_>>();

        Ok(CorrelationMatrix {
            labels: columns.to_vec(),
            values,
        })
    }

    /// Pearson's r over rows where both values are present; NaN when undefined.
    pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
        let pairs: Vec<(f64, f64)> = x
            .iter()
            .zip(y.iter())
            .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
            .collect();
        let n = pairs.len();
        if n < 2 {
            return f64::NAN;
        }

        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for (a, b) in &pairs {
            let dx = a - mean_x;
            let dy = b - mean_y;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }

        if sxx == 0.0 || syy == 0.0 {
            return f64::NAN;
        }
        (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
    }
}
