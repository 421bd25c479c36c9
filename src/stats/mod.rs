//! Stats module - regression frame, OLS fitting, reporting and correlations

mod calculator;
pub mod design;
pub mod regression;
mod summary;

pub use calculator::{CorrelationMatrix, StatsCalculator};
pub use design::{lag_column_name, Design, RegressionFrame};
pub use regression::{Coefficient, OlsModel, OlsResults, SIGNIFICANCE_THRESHOLD};
