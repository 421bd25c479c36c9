//! Merge monthly national air-quality averages with thermal power generation
//! and estimate the lagged effect of generation on a pollutant by OLS.

pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod stats;

pub use config::{AirQualitySource, JoinPolicy, PipelineConfig};
pub use error::{PipelineError, Result};
