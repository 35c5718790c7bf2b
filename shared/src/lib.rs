//! Chimetrics Shared Library
//!
//! This crate contains the core of the Chimetrics exporter: the watched
//! target registry, per-host `ClickHouse` sessions and the collection pass
//! that turns system tables into exposable metric samples.
//!
//! # Modules
//!
//! - [`models`] - Watched targets and metric samples
//! - [`registry`] - Concurrent registry of watched targets
//! - [`control`] - Validated list/upsert/remove operations on the registry
//! - [`config`] - Connection defaults
//! - [`connection`] - Backend traits and per-host sessions
//! - [`collector`] - Collection passes and the exposed metric set
//!
//! # Example
//!
//! ```
//! use shared::models::Target;
//! use shared::registry::WatchedTargetRegistry;
//!
//! let registry = WatchedTargetRegistry::new();
//! registry.upsert(Target::new("default", "chi-a", vec!["10.0.0.1:8123".to_string()]));
//!
//! assert_eq!(registry.len(), 1);
//! assert_eq!(registry.snapshot()[0].key.to_string(), "default/chi-a");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collector;
pub mod config;
pub mod connection;
pub mod control;
pub mod models;
pub mod registry;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
