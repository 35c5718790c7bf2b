//! Metrics exposition and background collection.
//!
//! This module renders the collected samples in the Prometheus text format
//! and runs the periodic collection loop.

pub mod exposition;
pub mod monitor;

pub use exposition::{render, sanitize_metric_name};
pub use monitor::CollectionMonitor;
