//! Build orchestration over the (platform, channel) × locale matrix.
//!
//! - [`matrix`] - which targets to build
//! - [`paths`] - per-target input resolution with platform overrides
//! - [`build`] - the driver that writes one feed per entries file

pub mod build;
pub mod matrix;
pub mod paths;
