//! Time formats used by TESS pixel data and ground-based archives.
//!
//! Everything is carried as a plain Julian Date internally; the formats here
//! are fixed offsets from JD. HJD values from the ZTF archive are treated as
//! JD on the UTC scale; the light-travel-time difference between HJD and the
//! barycentric scales is seconds-level and irrelevant for display and
//! folding at the periods handled here.

use std::fmt;
use std::str::FromStr;

use crate::LightCurveError;

/// JD = MJD + this offset.
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// JD = BTJD + this offset (TESS barycentric offset).
pub const BTJD_OFFSET: f64 = 2_457_000.0;

/// Supported time representations, all fixed offsets from Julian Date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Julian Date.
    Jd,
    /// Heliocentric Julian Date. Numerically treated as JD; kept separate
    /// so axes of curves read from an `hjd` column are labelled as such.
    Hjd,
    /// Modified Julian Date.
    Mjd,
    /// Barycentric TESS Julian Date (BJD - 2457000).
    Btjd,
}

impl TimeFormat {
    /// Convert a value in this format to plain JD.
    pub fn to_jd(self, value: f64) -> f64 {
        match self {
            TimeFormat::Jd | TimeFormat::Hjd => value,
            TimeFormat::Mjd => value + MJD_OFFSET,
            TimeFormat::Btjd => value + BTJD_OFFSET,
        }
    }

    /// Convert a plain JD into this format.
    pub fn from_jd(self, jd: f64) -> f64 {
        match self {
            TimeFormat::Jd | TimeFormat::Hjd => jd,
            TimeFormat::Mjd => jd - MJD_OFFSET,
            TimeFormat::Btjd => jd - BTJD_OFFSET,
        }
    }

    /// Upper-case label for axis titles, e.g. `Time [HJD]`.
    pub fn label(&self) -> &'static str {
        match self {
            TimeFormat::Jd => "JD",
            TimeFormat::Hjd => "HJD",
            TimeFormat::Mjd => "MJD",
            TimeFormat::Btjd => "BTJD",
        }
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeFormat {
    type Err = LightCurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jd" => Ok(TimeFormat::Jd),
            "hjd" => Ok(TimeFormat::Hjd),
            "mjd" => Ok(TimeFormat::Mjd),
            "btjd" => Ok(TimeFormat::Btjd),
            other => Err(LightCurveError::BadTimeFormat(other.to_string())),
        }
    }
}

/// A point in time expressed in one of the supported formats.
///
/// Used for user-supplied fold epochs, which arrive as a bare number plus a
/// format selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub value: f64,
    pub format: TimeFormat,
}

impl Epoch {
    pub fn new(value: f64, format: TimeFormat) -> Self {
        Self { value, format }
    }

    /// The epoch as a plain Julian Date.
    pub fn jd(&self) -> f64 {
        self.format.to_jd(self.value)
    }
}
