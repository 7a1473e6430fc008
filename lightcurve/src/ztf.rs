//! Reader for ZTF archive light-curve files in IRSA's CSV export dialect.
//!
//! The format is a plain comma-separated table with one header row; required
//! columns are the time column (`hjd` by default), `mag` and `magerr`.
//! `catflags` and `filtercode` are used when present.

use std::io::Read;

use regex::Regex;
use tracing::warn;

use crate::curve::{META_FILE_URL, META_FLUX_ORIGIN, META_OBJECT, META_TIME_ORIGIN};
use crate::time::TimeFormat;
use crate::{LightCurve, LightCurveError, Result, Sample};

/// Options for [`read_ztf_csv`].
#[derive(Debug, Clone)]
pub struct ZtfReadOptions {
    /// Column holding the sample times.
    pub time_column: String,
    /// Format of the time column values.
    pub time_format: TimeFormat,
    /// Column holding the magnitudes.
    pub flux_column: String,
    /// Column holding the magnitude errors.
    pub flux_err_column: String,
    /// Drop rows with a non-zero `catflags` value, the guideline for VSX
    /// submissions. Disable to keep flagged cadences.
    pub mask_catflags: bool,
}

impl Default for ZtfReadOptions {
    fn default() -> Self {
        Self {
            time_column: "hjd".to_string(),
            time_format: TimeFormat::Hjd,
            flux_column: "mag".to_string(),
            flux_err_column: "magerr".to_string(),
            mask_catflags: true,
        }
    }
}

/// Parse a cell to f64, mapping empty/masked cells to NaN.
fn parse_cell(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

/// Extract a `ZTF OID <id>` label from an IRSA light-curve URL, if it is one.
pub fn object_label_from_url(url: &str) -> Option<String> {
    // Only the canonical nph_light_curves endpoint carries an OID we trust.
    let re = Regex::new(r"https://irsa\.ipac\.caltech\.edu/cgi-bin/ZTF/nph_light_curves.+ID=(\d+)")
        .expect("static regex");
    re.captures(url)
        .map(|c| format!("ZTF OID {}", &c[1]))
}

/// Read a ZTF archive CSV export into a [`LightCurve`].
///
/// `url` is recorded as provenance and, when it is an IRSA `nph_light_curves`
/// link, used to derive the object label. Rows whose time value is not finite
/// are dropped with a logged warning; real exports occasionally carry `nan`
/// HJD values even when an MJD is present.
pub fn read_ztf_csv(reader: impl Read, url: &str, options: &ZtfReadOptions) -> Result<LightCurve> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column_index = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LightCurveError::MissingColumn(name.to_string()))
    };

    let time_idx = column_index(&options.time_column)?;
    let mag_idx = column_index(&options.flux_column)?;
    let mag_err_idx = column_index(&options.flux_err_column)?;
    let catflags_idx = headers.iter().position(|h| h == "catflags");
    let filter_idx = headers.iter().position(|h| h == "filtercode");

    let mut samples = Vec::new();
    let mut invalid_time_rows = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let time_raw = parse_cell(record.get(time_idx).unwrap_or(""));
        let time_jd = options.time_format.to_jd(time_raw);
        if !time_jd.is_finite() {
            invalid_time_rows += 1;
            continue;
        }
        if options.mask_catflags {
            if let Some(idx) = catflags_idx {
                if parse_cell(record.get(idx).unwrap_or("")) != 0.0 {
                    continue;
                }
            }
        }
        samples.push(Sample {
            time_jd,
            mag: parse_cell(record.get(mag_idx).unwrap_or("")),
            mag_err: parse_cell(record.get(mag_err_idx).unwrap_or("")),
            filter: filter_idx
                .and_then(|idx| record.get(idx))
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string()),
        });
    }

    if invalid_time_rows > 0 {
        warn!(
            rows = invalid_time_rows,
            url, "skipped rows without a valid time value"
        );
    }

    let mut lc = LightCurve::new(samples, options.time_format);
    lc.meta.insert(META_FILE_URL.to_string(), url.to_string());
    lc.meta
        .insert(META_FLUX_ORIGIN.to_string(), options.flux_column.clone());
    lc.meta
        .insert(META_TIME_ORIGIN.to_string(), options.time_column.clone());
    if let Some(label) = object_label_from_url(url) {
        lc.meta.insert(META_OBJECT.to_string(), label.clone());
        lc.label = label;
    }

    Ok(lc)
}
