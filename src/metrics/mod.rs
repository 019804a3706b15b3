//! Persistent usage metrics

pub mod usage;

pub use usage::{Outcome, UsageMetrics, UsageRecord};
