//! ZTF objects provider backed by IRSA's TAP service.
//!
//! One synchronous ADQL cone query with CSV output. Each source carries a
//! link to its IRSA light-curve CSV export, which is what the light-curve
//! viewer consumes.

use tracing::debug;
use url::Url;

use crate::provider::{
    Astrometry, CatalogProvider, CatalogSource, ConeSearch, DetailView, MarkerShape, MarkerStyle,
};
use crate::{CatalogError, Result};

/// Default IRSA endpoint.
pub const DEFAULT_IRSA_BASE: &str = "https://irsa.ipac.caltech.edu";

/// ZTF objects table on the TAP service.
const ZTF_OBJECTS_TABLE: &str = "ztf_objects_dr23";

/// Data-release collection tag used in light-curve links.
const ZTF_COLLECTION: &str = "ztf_dr23";

fn filter_code(fid: i64) -> &'static str {
    match fid {
        1 => "zg",
        2 => "zr",
        3 => "zi",
        _ => "?",
    }
}

/// ZTF objects catalog adapter.
#[derive(Debug, Clone)]
pub struct ZtfObjectsProvider {
    base_url: String,
    /// Override for the search radius; ZTF fields are dense, the original
    /// configuration narrows the cone to 1.5 arcmin.
    pub radius_arcsec: Option<f64>,
}

impl Default for ZtfObjectsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ZtfObjectsProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_IRSA_BASE.to_string(),
            radius_arcsec: Some(90.0),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            radius_arcsec: Some(90.0),
        }
    }

    fn effective_radius_deg(&self, cone: &ConeSearch) -> f64 {
        self.radius_arcsec.unwrap_or(cone.radius_arcsec) / 3600.0
    }

    fn query_url(&self, cone: &ConeSearch) -> Result<String> {
        let adql = format!(
            "SELECT oid, ra, dec, fid, medianmag, ngoodobs FROM {ZTF_OBJECTS_TABLE} \
             WHERE CONTAINS(POINT('ICRS', ra, dec), CIRCLE('ICRS', {:.8}, {:.8}, {:.8}))=1 \
             AND medianmag < {:.2} AND medianmag > 0",
            cone.ra_deg,
            cone.dec_deg,
            self.effective_radius_deg(cone),
            cone.magnitude_limit
        );
        let mut url = Url::parse(&format!(
            "{}/TAP/sync",
            self.base_url.trim_end_matches('/')
        ))
        .map_err(|e| CatalogError::Parse {
            service: "IRSA".to_string(),
            detail: format!("bad base URL {:?}: {e}", self.base_url),
        })?;
        url.query_pairs_mut()
            .append_pair("QUERY", &adql)
            .append_pair("FORMAT", "CSV");
        Ok(url.into())
    }

    /// Light-curve CSV export link for one ZTF object id.
    pub fn lightcurve_url(&self, oid: &str) -> String {
        format!(
            "{}/cgi-bin/ZTF/nph_light_curves?ID={oid}&COLLECTION={ZTF_COLLECTION}&FORMAT=csv",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl CatalogProvider for ZtfObjectsProvider {
    fn label(&self) -> &str {
        "ZTF"
    }

    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            shape: MarkerShape::Circle,
            color: "#1f77b4",
            fill_alpha: 0.5,
        }
    }

    fn query_region(&self, cone: &ConeSearch) -> Result<Vec<CatalogSource>> {
        let url = self.query_url(cone)?;
        debug!(%url, "ZTF objects query");
        let mut response = ureq::get(&url).call().map_err(|e| CatalogError::Http {
            url: url.clone(),
            source: Box::new(e),
        })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| CatalogError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());
        let headers = reader.headers()?.clone();
        let index = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let (Some(oid_i), Some(ra_i), Some(dec_i)) = (index("oid"), index("ra"), index("dec"))
        else {
            return Err(CatalogError::Parse {
                service: "IRSA".to_string(),
                detail: format!("missing oid/ra/dec columns in {:?}", headers),
            });
        };
        let fid_i = index("fid");
        let medianmag_i = index("medianmag");
        let ngoodobs_i = index("ngoodobs");

        let mut sources = Vec::new();
        for record in reader.records() {
            let record = record?;
            let oid = record.get(oid_i).unwrap_or_default().to_string();
            let (Some(ra), Some(dec)) = (
                record.get(ra_i).and_then(|v| v.parse::<f64>().ok()),
                record.get(dec_i).and_then(|v| v.parse::<f64>().ok()),
            ) else {
                continue;
            };
            let median_mag = medianmag_i
                .and_then(|i| record.get(i))
                .and_then(|v| v.parse::<f64>().ok());
            let filter = fid_i
                .and_then(|i| record.get(i))
                .and_then(|v| v.parse::<i64>().ok())
                .map(filter_code);
            let nobs = ngoodobs_i.and_then(|i| record.get(i)).unwrap_or_default();

            let mut tooltip = vec![("ZTF OID".to_string(), oid.clone())];
            if let Some(f) = filter {
                tooltip.push(("Filter".to_string(), f.to_string()));
            }
            if let Some(m) = median_mag {
                tooltip.push(("median mag".to_string(), format!("{m:.3}")));
            }
            if !nobs.is_empty() {
                tooltip.push(("N obs".to_string(), nobs.to_string()));
            }

            let lc_url = self.lightcurve_url(&oid);
            let detail = DetailView {
                rows: tooltip.clone(),
                extra_links: vec![format!(
                    r#"<a target="_blank" href="{lc_url}">Light curve CSV</a>"#
                )],
            };

            sources.push(CatalogSource {
                // ZTF positions are epoch-of-survey; no proper motions.
                astrometry: Astrometry::fixed(ra, dec),
                mag_for_size: median_mag.unwrap_or(f64::NAN),
                tooltip,
                detail,
                lightcurve_url: Some(lc_url),
            });
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use httpmock::prelude::*;

    const ZTF_CSV: &str = "\
oid,ra,dec,fid,medianmag,ngoodobs\n\
848110200002484,104.901280,23.480870,2,14.35,412\n\
848110200009999,104.905000,23.479000,1,16.80,98\n\
848110200000000,,,1,15.0,3\n";

    fn cone() -> ConeSearch {
        ConeSearch {
            ra_deg: 104.9,
            dec_deg: 23.48,
            radius_arcsec: 300.0,
            magnitude_limit: 18.0,
        }
    }

    #[test]
    fn builds_tap_query() {
        let provider = ZtfObjectsProvider::with_base_url("https://irsa.example");
        let url = provider.query_url(&cone()).unwrap();
        assert!(url.starts_with("https://irsa.example/TAP/sync?"));
        assert!(url.contains("FORMAT=CSV"));
        // 90 arcsec provider radius overrides the 300 arcsec cone.
        assert!(url.contains("0.02500000"));
    }

    #[test]
    fn cone_radius_used_when_override_cleared() {
        let mut provider = ZtfObjectsProvider::with_base_url("https://irsa.example");
        provider.radius_arcsec = None;
        let url = provider.query_url(&cone()).unwrap();
        assert!(url.contains("0.08333333"));
    }

    #[test]
    fn reshapes_csv_rows() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/TAP/sync");
            then.status(200).body(ZTF_CSV);
        });

        let provider = ZtfObjectsProvider::with_base_url(server.base_url());
        let sources = provider.query_region(&cone()).unwrap();
        // Row without coordinates is dropped.
        assert_eq!(sources.len(), 2);
        let s = &sources[0];
        assert_relative_eq!(s.astrometry.ra_j2000, 104.90128);
        assert!(s.tooltip.iter().any(|(k, v)| k == "Filter" && v == "zr"));
        assert!(s.tooltip.iter().any(|(k, v)| k == "median mag" && v == "14.350"));
        let lc = s.lightcurve_url.as_deref().unwrap();
        assert!(lc.contains("nph_light_curves?ID=848110200002484"));
        assert!(lc.contains("FORMAT=csv"));
    }

    #[test]
    fn filter_codes_map() {
        assert_eq!(filter_code(1), "zg");
        assert_eq!(filter_code(2), "zr");
        assert_eq!(filter_code(3), "zi");
        assert_eq!(filter_code(9), "?");
    }
}
