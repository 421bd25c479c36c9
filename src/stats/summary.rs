//! Plain-text regression report in the familiar two-column OLS summary layout.

use crate::error::{PipelineError, Result};
use crate::stats::regression::OlsResults;
use std::fmt::Write as _;
use std::path::Path;

const WIDTH: usize = 78;

impl OlsResults {
    /// Render the fit statistics, coefficient table and residual diagnostics.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let double = "=".repeat(WIDTH);
        let single = "-".repeat(WIDTH);

        let _ = writeln!(out, "{:^width$}", "OLS Regression Results", width = WIDTH);
        let _ = writeln!(out, "{double}");

        let left = [
            ("Dep. Variable:", self.dependent.clone()),
            ("Model:", "OLS".to_string()),
            ("Method:", "Least Squares".to_string()),
            ("Sample:", self.sample.clone().unwrap_or_else(|| "-".to_string())),
            ("No. Observations:", self.n_obs.to_string()),
            ("Df Residuals:", self.df_resid.to_string()),
            ("Df Model:", self.df_model.to_string()),
        ];
        let right = [
            ("R-squared:", format!("{:.3}", self.r_squared)),
            ("Adj. R-squared:", format!("{:.3}", self.adj_r_squared)),
            ("F-statistic:", format!("{:.2}", self.f_statistic)),
            ("Prob (F-statistic):", format!("{:.3e}", self.f_p_value)),
            ("Log-Likelihood:", format!("{:.2}", self.log_likelihood)),
            ("AIC:", format!("{:.1}", self.aic)),
            ("BIC:", format!("{:.1}", self.bic)),
        ];
        for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
            let _ = writeln!(out, "{:<20}{:>18}   {:<20}{:>17}", lk, lv, rk, rv);
        }
        let _ = writeln!(out, "{double}");

        let name_width = self
            .coefficients
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(5)
            .max(5);
        let _ = writeln!(
            out,
            "{:<nw$} {:>10} {:>10} {:>8} {:>7} {:>10} {:>10}",
            "",
            "coef",
            "std err",
            "t",
            "P>|t|",
            "[0.025",
            "0.975]",
            nw = name_width
        );
        let _ = writeln!(out, "{single}");
        for c in &self.coefficients {
            let marker = if c.is_significant() { "*" } else { " " };
            let _ = writeln!(
                out,
                "{:<nw$} {:>10.4} {:>10.3} {:>8.3} {:>7.3} {:>10.3} {:>10.3}{}",
                c.name,
                c.coef,
                c.std_err,
                c.t_value,
                c.p_value,
                c.ci_lower,
                c.ci_upper,
                marker,
                nw = name_width
            );
        }
        let _ = writeln!(out, "{double}");

        let diagnostics = [
            (
                ("Skew:", format!("{:.3}", self.skew)),
                ("Durbin-Watson:", format!("{:.3}", self.durbin_watson)),
            ),
            (
                ("Kurtosis:", format!("{:.3}", self.kurtosis)),
                ("Jarque-Bera (JB):", format!("{:.3}", self.jarque_bera)),
            ),
            (
                ("Cond. No.", format!("{:.3e}", self.condition_number)),
                ("Prob(JB):", format!("{:.3}", self.jb_p_value)),
            ),
        ];
        for ((lk, lv), (rk, rv)) in diagnostics.iter() {
            let _ = writeln!(out, "{:<20}{:>18}   {:<20}{:>17}", lk, lv, rk, rv);
        }
        let _ = writeln!(out, "{double}");
        let _ = writeln!(out, "* p < 0.05");
        out
    }

    pub fn write_summary(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.summary()).map_err(|e| PipelineError::Io(path.to_path_buf(), e))
    }
}
