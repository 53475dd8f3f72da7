//! Housing-market and short-term-rental indicator pipeline.
//!
//! CSV text goes through [`csv_text`] and [`loader`] to become typed
//! [`Record`]s. Everything downstream is a pure function over a record slice:
//! the validity gate, per-city recency and growth in [`process`], Pearson
//! correlations in [`stats`], and period grouping in [`grouping`]. The
//! [`reports`] and [`output`] modules turn those views into tables and files.
pub mod csv_text;
pub mod error;
pub mod grouping;
pub mod loader;
pub mod output;
pub mod process;
pub mod reports;
pub mod stats;
pub mod types;
pub mod util;

pub use error::{InsightsError, Result};
pub use grouping::{CityScope, PeriodAggregate, PeriodKey, Reduction, SeriesPoint};
pub use loader::{load_from_path, load_from_str, normalize, LoadReport};
pub use process::{
    filter_valid, filter_valid_with, growth_by_city, most_recent_by_city, DashboardFilter,
    ZeroPolicy,
};
pub use stats::correlate;
pub use types::{CorrelationMatrix, GrowthSummary, Metric, RawRow, Record};
