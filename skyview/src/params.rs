//! Lenient query-string parsing.
//!
//! Every parameter is optional and malformed values degrade to "not given"
//! rather than a 400, so hand-edited URLs keep working.

use std::collections::HashMap;

use lightcurve::TimeFormat;

fn parse_opt<T: std::str::FromStr>(query: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = query.get(key)?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse().ok()
}

fn parse_flag(query: &HashMap<String, String>, key: &str) -> bool {
    matches!(
        query.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("on") | Some("true") | Some("yes")
    )
}

/// Parameters of the skyview page.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkyViewParams {
    pub tic: Option<u64>,
    pub sector: Option<i64>,
    /// Explicit faint limit; when absent the target's Tmag + 7 is used.
    pub magnitude_limit: Option<f64>,
}

impl SkyViewParams {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self {
            tic: parse_opt(query, "tic"),
            sector: parse_opt(query, "sector"),
            magnitude_limit: parse_opt::<f64>(query, "magnitude_limit").filter(|m| m.is_finite()),
        }
    }
}

/// Parameters of the light-curve page.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurveParams {
    pub url: Option<String>,
    /// Folding period in days; non-positive input disables folding.
    pub period_days: Option<f64>,
    pub epoch: Option<f64>,
    pub epoch_format: TimeFormat,
    /// Color the folded points by observation time.
    pub cmap: bool,
}

impl LightCurveParams {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self {
            url: query
                .get("url")
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            period_days: parse_opt::<f64>(query, "period").filter(|p| p.is_finite() && *p > 0.0),
            epoch: parse_opt::<f64>(query, "epoch").filter(|e| e.is_finite()),
            epoch_format: parse_opt(query, "epoch_format").unwrap_or(TimeFormat::Btjd),
            cmap: parse_flag(query, "cmap"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn skyview_params_parse() {
        let params = SkyViewParams::from_query(&query(&[
            ("tic", "261136679"),
            ("sector", "41"),
            ("magnitude_limit", "17.5"),
        ]));
        assert_eq!(params.tic, Some(261_136_679));
        assert_eq!(params.sector, Some(41));
        assert_eq!(params.magnitude_limit, Some(17.5));
    }

    #[test]
    fn garbage_degrades_to_none() {
        let params = SkyViewParams::from_query(&query(&[
            ("tic", "abc"),
            ("sector", ""),
            ("magnitude_limit", "NaN"),
        ]));
        assert_eq!(params, SkyViewParams::default());
    }

    #[test]
    fn nonpositive_period_disables_folding() {
        let params = LightCurveParams::from_query(&query(&[("period", "-1.5")]));
        assert_eq!(params.period_days, None);
        let params = LightCurveParams::from_query(&query(&[("period", "0")]));
        assert_eq!(params.period_days, None);
    }

    #[test]
    fn epoch_format_defaults_to_btjd() {
        let params = LightCurveParams::from_query(&query(&[("epoch_format", "bogus")]));
        assert_eq!(params.epoch_format, TimeFormat::Btjd);
        let params = LightCurveParams::from_query(&query(&[("epoch_format", "hjd")]));
        assert_eq!(params.epoch_format, TimeFormat::Hjd);
    }

    #[test]
    fn cmap_flag_variants() {
        assert!(LightCurveParams::from_query(&query(&[("cmap", "on")])).cmap);
        assert!(LightCurveParams::from_query(&query(&[("cmap", "1")])).cmap);
        assert!(!LightCurveParams::from_query(&query(&[("cmap", "0")])).cmap);
        assert!(!LightCurveParams::from_query(&query(&[])).cmap);
    }
}
