//! Alert queue and trend analysis.
//!
//! [`manager::AlertManager`] accumulates [`Alert`]s raised by collectors
//! during a collection pass and hands the whole queue to a consumer on
//! drain. [`trend`] classifies a rolling window of load samples into a
//! qualitative direction.
//!
//! [`Alert`]: ferromon_common::Alert

pub mod manager;
pub mod trend;


pub use manager::AlertManager;
pub use trend::{classify, LoadTrend, RollingHistory};
