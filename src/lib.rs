//! Descriptive analytics for a logistics movement tracker export.
//!
//! The pipeline is load ([`loader`]) -> filter/group ([`pipeline`]) ->
//! rank ([`rank`]) / forecast ([`forecast`]) -> render ([`chart`], [`deck`]).
//! [`reports`] wires those stages into the individual analyses.

pub mod chart;
pub mod config;
pub mod deck;
pub mod error;
pub mod forecast;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod rank;
pub mod reports;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{Result, TrackerError};
pub use forecast::{forecast, Forecast, ForecastStrategy};
pub use loader::{Cell, Table};
pub use pipeline::{group_by, Aggregate, AggregateTable, KeyNormalization, Period, Predicate, TimeSeries};
pub use rank::top_n;
