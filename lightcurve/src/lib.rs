//! Light curve handling for the skyview application.
//!
//! Provides the time formats used by TESS and ground-based archives,
//! a magnitude-based [`LightCurve`] container with phase folding, and a
//! reader for the IRSA ZTF archive light-curve CSV export dialect.

use thiserror::Error;

pub mod curve;
pub mod time;
pub mod ztf;

pub use curve::{FoldedLightCurve, FoldedSample, LightCurve, Sample};
pub use time::{Epoch, TimeFormat};
pub use ztf::{read_ztf_csv, ZtfReadOptions};

/// Errors from light curve parsing and manipulation.
#[derive(Debug, Error)]
pub enum LightCurveError {
    #[error("Required column {0} is not found")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid time format: {0}")]
    BadTimeFormat(String),

    #[error("Fold period must be positive, got {0}")]
    NonPositivePeriod(f64),
}

pub type Result<T> = std::result::Result<T, LightCurveError>;
