//! Charts module - static chart rendering

mod renderer;

pub use renderer::{HeatmapRenderer, HEATMAP_SIZE};
