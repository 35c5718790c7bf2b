//! API route definitions.
//!
//! This module organizes all HTTP routes for the Chimetrics exporter.

mod chi;
mod health;
mod metrics;

pub use chi::{chi_routes, ChiError};
pub use health::health_routes;
pub use metrics::metrics_routes;
