//! Statistics model and aggregation.
//!
//! Everything here is synchronous and pure: functions take the latest
//! snapshot by reference and return chart-ready series.

mod aggregator;
mod history;
mod models;
mod normalizer;
mod rank;

pub use aggregator::*;
pub use history::*;
pub use models::*;
pub use normalizer::*;
pub use rank::*;
