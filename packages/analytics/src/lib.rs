#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Temporal aggregation and wildfire correlation over enriched
//! observations.
//!
//! Both operations are pure transformations of in-memory tables. Bad
//! individual records are excluded and reported through
//! [`wildfire_aqi_observation_models::Diagnostics`]; only index
//! construction can fail.

pub mod correlate;
pub mod rolling;

use thiserror::Error;

pub use correlate::{CorrelationCounts, WildfireCorrelator, correlate};
pub use rolling::{RollingValue, SeriesPoint, rolling_average};

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The wildfire proximity index could not be built.
    #[error("Spatial error: {0}")]
    Spatial(#[from] wildfire_aqi_spatial::SpatialError),
}
