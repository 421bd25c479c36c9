//! Ordinary least squares on a prepared design, with the usual inference statistics.

use crate::error::{PipelineError, Result};
use crate::stats::design::Design;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use std::f64::consts::PI;
use std::path::Path;
use tracing::{debug, info};

/// Significance threshold used to flag coefficients.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Relative singular-value cut-off below which the design is treated as rank deficient.
const RANK_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub coef: f64,
    pub std_err: f64,
    pub t_value: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl Coefficient {
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_THRESHOLD
    }
}

/// Fitted model and its diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct OlsResults {
    pub dependent: String,
    pub n_obs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_p_value: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub durbin_watson: f64,
    pub jarque_bera: f64,
    pub jb_p_value: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub condition_number: f64,
    pub coefficients: Vec<Coefficient>,
    #[serde(skip)]
    pub residuals: Vec<f64>,
    pub sample: Option<String>,
}

pub struct OlsModel;

impl OlsModel {
    /// Fit `y = X b + e` by least squares. `X` must already include the intercept column.
    pub fn fit(design: &Design, dependent: &str) -> Result<OlsResults> {
        let x = &design.x;
        let y = &design.y;
        let n = x.nrows();
        let k = x.ncols();

        if n <= k {
            return Err(PipelineError::InsufficientObservations {
                observations: n,
                params: k,
            });
        }

        let singular_values = x.singular_values();
        let sv_max = singular_values.max();
        let sv_min = singular_values.min();
        if sv_max <= 0.0 || sv_min / sv_max < RANK_TOLERANCE {
            return Err(PipelineError::SingularDesign);
        }
        let condition_number = sv_max / sv_min;

        let xt = x.transpose();
        let cholesky = (&xt * x).cholesky().ok_or(PipelineError::SingularDesign)?;
        let beta = cholesky.solve(&(&xt * y));
        let xtx_inv = cholesky.inverse();

        let residuals = y - x * &beta;
        let ssr = residuals.norm_squared();
        let y_mean = y.mean();
        let centered_tss = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();

        let df_resid = n - k;
        let df_model = k - 1;
        let sigma2 = ssr / df_resid as f64;

        let r_squared = 1.0 - ssr / centered_tss;
        let adj_r_squared = 1.0 - (n - 1) as f64 / df_resid as f64 * (1.0 - r_squared);

        let (f_statistic, f_p_value) = if df_model > 0 {
            let f = ((centered_tss - ssr) / df_model as f64) / sigma2;
            let dist = FisherSnedecor::new(df_model as f64, df_resid as f64)
                .map_err(|e| PipelineError::Distribution(e.to_string()))?;
            (f, upper_tail(&dist, f))
        } else {
            (f64::NAN, f64::NAN)
        };

        let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
            .map_err(|e| PipelineError::Distribution(e.to_string()))?;
        let t_crit = t_dist.inverse_cdf(1.0 - SIGNIFICANCE_THRESHOLD / 2.0);

        let coefficients = design
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let coef = beta[i];
                let std_err = (sigma2 * xtx_inv[(i, i)]).sqrt();
                let t_value = coef / std_err;
                Coefficient {
                    name: name.clone(),
                    coef,
                    std_err,
                    t_value,
                    p_value: 2.0 * upper_tail(&t_dist, t_value.abs()),
                    ci_lower: coef - t_crit * std_err,
                    ci_upper: coef + t_crit * std_err,
                }
            })
            .collect::<Vec<_>>();

        let n_f = n as f64;
        let log_likelihood = -n_f / 2.0 * ((2.0 * PI).ln() + (ssr / n_f).ln() + 1.0);
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;
        let bic = -2.0 * log_likelihood + k as f64 * n_f.ln();

        let residuals: Vec<f64> = residuals.iter().copied().collect();
        let durbin_watson = durbin_watson(&residuals);
        let (skew, kurtosis) = moments(&residuals);
        let jarque_bera = n_f / 6.0 * (skew.powi(2) + (kurtosis - 3.0).powi(2) / 4.0);
        let chi2 = ChiSquared::new(2.0).map_err(|e| PipelineError::Distribution(e.to_string()))?;
        let jb_p_value = upper_tail(&chi2, jarque_bera);

        info!(
            "OLS fit on {} observations, {} parameters: R² = {:.4}",
            n, k, r_squared
        );
        debug!("Condition number {:.3e}", condition_number);

        Ok(OlsResults {
            dependent: dependent.to_string(),
            n_obs: n,
            df_model,
            df_resid,
            r_squared,
            adj_r_squared,
            f_statistic,
            f_p_value,
            log_likelihood,
            aic,
            bic,
            durbin_watson,
            jarque_bera,
            jb_p_value,
            skew,
            kurtosis,
            condition_number,
            coefficients,
            residuals,
            sample: None,
        })
    }
}

impl OlsResults {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Write the coefficient table and fit statistics as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Survival function that tolerates the non-finite statistics of a perfect fit.
fn upper_tail<D: ContinuousCDF<f64, f64>>(dist: &D, x: f64) -> f64 {
    if x.is_nan() {
        f64::NAN
    } else if x == f64::INFINITY {
        0.0
    } else {
        dist.sf(x)
    }
}

fn durbin_watson(residuals: &[f64]) -> f64 {
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let diff: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    diff / ssr
}

/// Sample skewness and (non-excess) kurtosis, population moments.
fn moments(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / n;
    (m3 / m2.powf(1.5), m4 / m2.powi(2))
}
