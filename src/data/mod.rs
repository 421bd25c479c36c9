//! Data module - table loading, reshaping and merging

mod loader;
mod processor;

pub use loader::{clean_number, DataLoader};
pub use processor::{parse_year_label, DataProcessor};
