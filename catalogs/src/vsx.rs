//! AAVSO VSX variable-star index provider.
//!
//! Speaks the VSX JSON API (`view=api.list` cone search). The API drops
//! fields that hold no data and returns an empty list instead of an object
//! when nothing matches, so parsing is defensive throughout. Magnitude
//! fields arrive as free-ish text (`<12.9: V`, `(0.05) V`) and are parsed
//! into limit flag, magnitude, uncertainty flag, passband and amplitude
//! marker, mirroring Vizier's `l_max`/`max`/`u_max`/`n_max` columns.

use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::provider::{
    Astrometry, CatalogProvider, CatalogSource, ConeSearch, DetailView, MarkerShape, MarkerStyle,
};
use crate::{CatalogError, Result};

/// Default VSX API endpoint.
pub const DEFAULT_VSX_BASE: &str = "https://www.aavso.org";

/// A magnitude cell parsed into its Vizier-style parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMag {
    /// Limit flag: `<`, `>` or empty.
    pub limit: String,
    /// Magnitude value; NaN when absent or unparseable.
    pub mag: f64,
    /// Uncertainty flag: `:` or empty.
    pub uncertain: String,
    /// Passband, e.g. `V`; unparseable text lands here whole.
    pub band: String,
    /// True when the value is an amplitude (parenthesized form).
    pub is_amplitude: bool,
}

impl ParsedMag {
    fn empty() -> Self {
        Self {
            mag: f64::NAN,
            ..Self::default()
        }
    }
}

fn is_masked(text: &str) -> bool {
    // String renditions of masked and NaN cells.
    text == "--" || text == "nan" || text.is_empty()
}

/// Parse `<12.9: V` style text: limit flag, magnitude, uncertainty, band.
pub fn parse_limit_mag_uncertainty_band(text: &str) -> ParsedMag {
    let text = text.trim();
    if is_masked(text) {
        return ParsedMag::empty();
    }
    let re = Regex::new(r"^\s*(?P<l>[><]?)(?P<mag>-?\d+(\.\d+)?)(?P<u>:?)\s*(?P<band>\S*)")
        .expect("static regex");
    match re.captures(text) {
        Some(caps) => ParsedMag {
            limit: caps["l"].to_string(),
            mag: caps["mag"].parse().unwrap_or(f64::NAN),
            uncertain: caps["u"].to_string(),
            band: caps["band"].to_string(),
            is_amplitude: false,
        },
        // Parse failed; keep the whole text in the band field (it is the
        // only free-text slot).
        None => ParsedMag {
            mag: f64::NAN,
            band: text.to_string(),
            ..ParsedMag::default()
        },
    }
}

/// Like [`parse_limit_mag_uncertainty_band`] but also handles the
/// parenthesized amplitude form `(0.05) V`.
pub fn parse_limit_mag_amp_uncertainty_band(text: &str) -> ParsedMag {
    let text = text.trim();
    if is_masked(text) {
        return ParsedMag::empty();
    }
    let plain = parse_limit_mag_uncertainty_band(text);
    if plain.mag.is_finite() {
        return plain;
    }
    let re = Regex::new(r"^\s*(?P<l>[><]?)\((?P<mag>-?\d+(\.\d+)?)(?P<u>:?)\)\s*(?P<band>\S*)")
        .expect("static regex");
    match re.captures(text) {
        Some(caps) => ParsedMag {
            limit: caps["l"].to_string(),
            mag: caps["mag"].parse().unwrap_or(f64::NAN),
            uncertain: caps["u"].to_string(),
            band: caps["band"].to_string(),
            is_amplitude: true,
        },
        None => ParsedMag {
            mag: f64::NAN,
            band: text.to_string(),
            ..ParsedMag::default()
        },
    }
}

/// Parse `123.456:` style numbers with a trailing uncertainty flag.
pub fn parse_number_with_uncertainty_flag(text: &str) -> (f64, String) {
    let text = text.trim();
    if is_masked(text) {
        return (f64::NAN, String::new());
    }
    let re = Regex::new(r"^\s*(-?\d+(\.\d+)?)(:?)\s*$").expect("static regex");
    match re.captures(text) {
        Some(caps) => (
            caps[1].parse().unwrap_or(f64::NAN),
            caps[3].to_string(),
        ),
        None => (f64::NAN, String::new()),
    }
}

/// Magnitude display text: `max - min`, `mag (amplitude)` or a single value.
pub fn mag_text(max: &ParsedMag, min: &ParsedMag) -> String {
    if !min.mag.is_finite() {
        // No range or amplitude.
        if !max.mag.is_finite() {
            return max.band.clone();
        }
        return format!("{}{}{} {}", max.limit, max.mag, max.uncertain, max.band)
            .trim()
            .to_string();
    }

    // When both passbands match, show it once, after the second value.
    let (band_max, band_min) = if max.band == min.band {
        (String::new(), format!(" {}", min.band))
    } else {
        (format!(" {}", max.band), format!(" {}", min.band))
    };

    if min.is_amplitude {
        format!(
            "{}{}{}{}  ({}{}{}){}",
            max.limit, max.mag, max.uncertain, band_max, min.limit, min.mag, min.uncertain, band_min
        )
    } else {
        format!(
            "{}{}{}{} - {}{}{}{}",
            max.limit, max.mag, max.uncertain, band_max, min.limit, min.mag, min.uncertain, band_min
        )
    }
}

/// One VSX object as delivered by the JSON API. Values arrive as strings;
/// fields with no data are omitted entirely.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct VsxRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "OID")]
    oid: String,
    #[serde(rename = "RA2000")]
    ra2000: String,
    #[serde(rename = "Declination2000")]
    dec2000: String,
    #[serde(rename = "ProperMotionRA")]
    pm_ra: String,
    #[serde(rename = "ProperMotionDec")]
    pm_dec: String,
    #[serde(rename = "VariabilityType")]
    variability_type: String,
    #[serde(rename = "SpectralType")]
    spectral_type: String,
    #[serde(rename = "MaxMag")]
    max_mag: String,
    #[serde(rename = "MinMag")]
    min_mag: String,
    #[serde(rename = "Period")]
    period: String,
    #[serde(rename = "Epoch")]
    epoch: String,
}

fn parse_records(body: &serde_json::Value) -> Result<Vec<VsxRecord>> {
    // "VSXObjects" is an object holding "VSXObject" when there are results,
    // and an empty array when there are none.
    let Some(objects) = body.get("VSXObjects").filter(|v| v.is_object()) else {
        return Ok(Vec::new());
    };
    let Some(list) = objects.get("VSXObject") else {
        return Ok(Vec::new());
    };
    serde_json::from_value(list.clone()).map_err(|e| CatalogError::Parse {
        service: "VSX".to_string(),
        detail: e.to_string(),
    })
}

/// AAVSO VSX catalog adapter.
#[derive(Debug, Clone)]
pub struct VsxProvider {
    base_url: String,
}

impl Default for VsxProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl VsxProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_VSX_BASE.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn query_url(&self, cone: &ConeSearch) -> Result<String> {
        let mut url = Url::parse(&format!(
            "{}/vsx/index.php",
            self.base_url.trim_end_matches('/')
        ))
        .map_err(|e| CatalogError::Parse {
            service: "VSX".to_string(),
            detail: format!("bad base URL {:?}: {e}", self.base_url),
        })?;
        url.query_pairs_mut()
            .append_pair("view", "api.list")
            .append_pair("ra", &format!("{:.8}", cone.ra_deg))
            .append_pair("dec", &format!("{:.8}", cone.dec_deg))
            .append_pair("radius", &format!("{:.6}", cone.radius_deg()))
            .append_pair("tomag", &format!("{:.2}", cone.magnitude_limit))
            .append_pair("format", "json");
        Ok(url.into())
    }

    fn to_source(&self, record: &VsxRecord) -> Option<CatalogSource> {
        let ra: f64 = record.ra2000.trim().parse().ok()?;
        let dec: f64 = record.dec2000.trim().parse().ok()?;
        let astrometry = Astrometry {
            ra_j2000: ra,
            dec_j2000: dec,
            pm_ra_mas_yr: record.pm_ra.trim().parse().ok(),
            pm_dec_mas_yr: record.pm_dec.trim().parse().ok(),
        };

        let max = parse_limit_mag_uncertainty_band(&record.max_mag);
        let min = parse_limit_mag_amp_uncertainty_band(&record.min_mag);
        let magnitude = mag_text(&max, &min);
        let (period_days, period_uncertain) = parse_number_with_uncertainty_flag(&record.period);
        let period_text = if period_days.is_finite() {
            format!("{period_days}{period_uncertain}")
        } else {
            String::new()
        };

        let tooltip = vec![
            ("Name".to_string(), record.name.clone()),
            ("Type".to_string(), record.variability_type.clone()),
            ("Magnitude".to_string(), magnitude.clone()),
            ("Period (d)".to_string(), period_text.clone()),
        ];

        let vsx_url = format!(
            "{}/vsx/index.php?view=detail.top&oid={}",
            self.base_url.trim_end_matches('/'),
            record.oid
        );
        let mut rows = vec![(
            "Name".to_string(),
            format!(r#"{} (<a href="{vsx_url}" target="_blank">VSX</a>)"#, record.name),
        )];
        rows.push(("Variability type".to_string(), record.variability_type.clone()));
        if !record.spectral_type.is_empty() {
            rows.push(("Spectral type".to_string(), record.spectral_type.clone()));
        }
        rows.push(("Magnitude".to_string(), magnitude));
        rows.push(("Period (d)".to_string(), period_text));
        let (epoch, epoch_uncertain) = parse_number_with_uncertainty_flag(&record.epoch);
        if epoch.is_finite() {
            rows.push(("Epoch".to_string(), format!("{epoch}{epoch_uncertain}")));
        }

        Some(CatalogSource {
            astrometry,
            // Constant marker size; VSX magnitudes are heterogeneous bands.
            mag_for_size: f64::NAN,
            tooltip,
            detail: DetailView {
                rows,
                extra_links: Vec::new(),
            },
            lightcurve_url: None,
        })
    }
}

impl CatalogProvider for VsxProvider {
    fn label(&self) -> &str {
        "VSX"
    }

    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            shape: MarkerShape::Cross,
            color: "#b22222",
            fill_alpha: 1.0,
        }
    }

    fn query_region(&self, cone: &ConeSearch) -> Result<Vec<CatalogSource>> {
        let url = self.query_url(cone)?;
        debug!(%url, "VSX query");
        let mut response = ureq::get(&url).call().map_err(|e| CatalogError::Http {
            url: url.clone(),
            source: Box::new(e),
        })?;
        let body: serde_json::Value =
            response
                .body_mut()
                .read_json()
                .map_err(|e| CatalogError::Http {
                    url: url.clone(),
                    source: Box::new(e),
                })?;
        let records = parse_records(&body)?;
        Ok(records.iter().filter_map(|r| self.to_source(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use httpmock::prelude::*;

    #[test]
    fn parse_plain_mag() {
        let p = parse_limit_mag_uncertainty_band("12.9 V");
        assert_relative_eq!(p.mag, 12.9);
        assert_eq!(p.band, "V");
        assert_eq!(p.limit, "");
        assert_eq!(p.uncertain, "");
    }

    #[test]
    fn parse_limit_and_uncertainty() {
        let p = parse_limit_mag_uncertainty_band("<12.9: V");
        assert_eq!(p.limit, "<");
        assert_eq!(p.uncertain, ":");
        assert_relative_eq!(p.mag, 12.9);
    }

    #[test]
    fn parse_masked_mag() {
        let p = parse_limit_mag_uncertainty_band("--");
        assert!(p.mag.is_nan());
        assert_eq!(p.band, "");
    }

    #[test]
    fn parse_unparseable_goes_to_band() {
        let p = parse_limit_mag_uncertainty_band("faint");
        assert!(p.mag.is_nan());
        assert_eq!(p.band, "faint");
    }

    #[test]
    fn parse_amplitude_form() {
        let p = parse_limit_mag_amp_uncertainty_band("(0.05) V");
        assert!(p.is_amplitude);
        assert_relative_eq!(p.mag, 0.05);
        assert_eq!(p.band, "V");
    }

    #[test]
    fn parse_period_with_flag() {
        let (value, flag) = parse_number_with_uncertainty_flag("1.6543:");
        assert_relative_eq!(value, 1.6543);
        assert_eq!(flag, ":");
        let (nan, flag) = parse_number_with_uncertainty_flag("--");
        assert!(nan.is_nan());
        assert_eq!(flag, "");
    }

    #[test]
    fn mag_text_range_same_band() {
        let max = parse_limit_mag_uncertainty_band("12.1 V");
        let min = parse_limit_mag_amp_uncertainty_band("12.9 V");
        assert_eq!(mag_text(&max, &min), "12.1 - 12.9 V");
    }

    #[test]
    fn mag_text_range_different_bands() {
        let max = parse_limit_mag_uncertainty_band("12.1 B");
        let min = parse_limit_mag_amp_uncertainty_band("12.9 V");
        assert_eq!(mag_text(&max, &min), "12.1 B - 12.9 V");
    }

    #[test]
    fn mag_text_amplitude() {
        let max = parse_limit_mag_uncertainty_band("12.1 V");
        let min = parse_limit_mag_amp_uncertainty_band("(0.05) V");
        assert_eq!(mag_text(&max, &min), "12.1  (0.05) V");
    }

    #[test]
    fn mag_text_single_value() {
        let max = parse_limit_mag_uncertainty_band("<12.9: V");
        let min = parse_limit_mag_amp_uncertainty_band("--");
        assert_eq!(mag_text(&max, &min), "<12.9: V");
    }

    fn vsx_json() -> serde_json::Value {
        serde_json::json!({
            "VSXObjects": {
                "VSXObject": [
                    {
                        "Name": "ASASSN-V J065936.30+232851.1",
                        "OID": "1549534",
                        "RA2000": "104.90128",
                        "Declination2000": "23.48087",
                        "ProperMotionRA": "1.95",
                        "ProperMotionDec": "-4.75",
                        "VariabilityType": "EW",
                        "MaxMag": "14.22 g",
                        "MinMag": "14.52 g",
                        "Period": "0.3305315",
                        "Epoch": "2458023.9197"
                    },
                    {
                        "Name": "No position",
                        "OID": "1"
                    }
                ]
            }
        })
    }

    #[test]
    fn parse_response_records() {
        let records = parse_records(&vsx_json()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "ASASSN-V J065936.30+232851.1");
        // Omitted fields default to empty strings.
        assert_eq!(records[1].max_mag, "");
    }

    #[test]
    fn empty_result_is_empty_list() {
        let body = serde_json::json!({ "VSXObjects": [] });
        assert!(parse_records(&body).unwrap().is_empty());
    }

    #[test]
    fn query_region_reshapes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/vsx/index.php")
                .query_param("view", "api.list")
                .query_param("format", "json");
            then.status(200).json_body(vsx_json());
        });

        let provider = VsxProvider::with_base_url(server.base_url());
        let cone = ConeSearch {
            ra_deg: 104.9,
            dec_deg: 23.48,
            radius_arcsec: 300.0,
            magnitude_limit: 18.0,
        };
        let sources = provider.query_region(&cone).unwrap();
        // The record without coordinates is dropped.
        assert_eq!(sources.len(), 1);
        let s = &sources[0];
        assert_relative_eq!(s.astrometry.ra_j2000, 104.90128);
        assert_eq!(s.astrometry.pm_ra_mas_yr, Some(1.95));
        assert!(s.tooltip.iter().any(|(k, v)| k == "Magnitude" && v == "14.22 - 14.52 g"));
        assert!(s
            .detail
            .rows
            .iter()
            .any(|(_, v)| v.contains("view=detail.top&oid=1549534")));
    }
}
