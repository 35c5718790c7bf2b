//! Data models for the Chimetrics exporter.
//!
//! This module contains the watched-target identity and the metric samples
//! produced by a collection pass.

pub mod sample;
pub mod target;

pub use sample::{MetricSample, SampleKind};
pub use target::{Target, TargetKey, TargetValidationError};
