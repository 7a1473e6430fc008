//! Gaia DR3 provider with TESS Input Catalog cross-match.
//!
//! One Vizier cone query against `I/355/gaiadr3`, locally filtered by Gmag,
//! plus a best-effort second query against `IV/39/tic82` to attach the TIC
//! id and Tmag of each Gaia source. Detail views link out to Vizier, SIMBAD
//! and (optionally) the Gaia DR3 Stellar Variability catalog.

use std::collections::HashMap;

use tracing::warn;

use crate::provider::{
    Astrometry, CatalogProvider, CatalogSource, ConeSearch, DetailView, MarkerShape, MarkerStyle,
};
use crate::vizier::VizierClient;
use crate::{CatalogError, Result};

const GAIA_CATALOG: &str = "I/355/gaiadr3";
const TIC_CATALOG: &str = "IV/39/tic82";

const GAIA_COLUMNS: &[&str] = &[
    "Source", "RAJ2000", "DEJ2000", "Plx", "pmRA", "pmDE", "Gmag", "BPmag", "RPmag", "BP-RP",
    "RUWE", "sepsi", "e_RV", "IPDfmp", "VarFlag",
];

/// Gaia DR3 x TIC catalog adapter.
#[derive(Debug, Clone)]
pub struct GaiaDr3TicProvider {
    vizier: VizierClient,
    /// Add the Gaia DR3 Stellar Variability (photometric dispersion) link to
    /// detail views.
    pub include_variability_link: bool,
    /// Extra Gaia columns surfaced in the detail view, as (column, label).
    pub extra_detail_columns: Vec<(String, String)>,
}

impl GaiaDr3TicProvider {
    pub fn new(vizier: VizierClient) -> Self {
        Self {
            vizier,
            include_variability_link: true,
            extra_detail_columns: vec![
                ("BP-RP".to_string(), "BP-RP".to_string()),
                ("RUWE".to_string(), "RUWE".to_string()),
                ("sepsi".to_string(), "sepsi".to_string()),
                ("e_RV".to_string(), "e_RV (km/s)".to_string()),
                ("IPDfmp".to_string(), "IPDfmp".to_string()),
            ],
        }
    }

    /// TIC id / Tmag keyed by Gaia source id. Failures degrade to an empty
    /// map; the cross-match is an enrichment, not a requirement.
    fn query_tic_crossmatch(&self, cone: &ConeSearch) -> HashMap<String, (String, Option<f64>)> {
        let table = match self
            .vizier
            .query_region(TIC_CATALOG, cone, &["TIC", "GAIA", "Tmag"], &[])
        {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "TIC cross-match query failed; continuing without TIC ids");
                return HashMap::new();
            }
        };
        let mut map = HashMap::new();
        for row in table.row_indices() {
            if let (Some(gaia), Some(tic)) = (table.get(row, "GAIA"), table.get(row, "TIC")) {
                map.insert(
                    gaia.to_string(),
                    (tic.to_string(), table.get_f64(row, "Tmag")),
                );
            }
        }
        map
    }

    fn detail_view(
        &self,
        source_id: &str,
        astrometry: &Astrometry,
        gmag: f64,
        plx: Option<f64>,
        tic: Option<&(String, Option<f64>)>,
        extra: &[(String, Option<String>)],
    ) -> DetailView {
        let vizier_base = self.vizier.base_url();
        let vizier_url = format!(
            "{vizier_base}/viz-bin/VizieR-4?-source=+I%2F355%2Fgaiadr3+I%2F355%2Fparamp&Source={source_id}"
        );
        let mut rows = vec![(
            "Source".to_string(),
            format!(r#"{source_id} (<a href="{vizier_url}" target="_blank">Vizier</a>)"#),
        )];
        rows.push(("Gmag".to_string(), format!("{gmag:.3}")));
        rows.push(("Parallax (mas)".to_string(), format_parallax(plx)));
        if let Some((tic_id, tmag)) = tic {
            rows.push(("TIC".to_string(), tic_id.clone()));
            if let Some(tmag) = tmag {
                rows.push(("Tmag".to_string(), format!("{tmag:.3}")));
            }
        }
        for (label, value) in extra {
            rows.push((label.clone(), value.clone().unwrap_or_default()));
        }

        let simbad_by_source = format!(
            "https://simbad.u-strasbg.fr/simbad/sim-id?Ident={}",
            urlencoding::encode(&format!("Gaia DR3 {source_id}"))
        );
        let simbad_by_coord = format!(
            "https://simbad.u-strasbg.fr/simbad/sim-coo?Coord={:.8}+{:.8}&Radius=2&Radius.unit=arcmin",
            astrometry.ra_j2000, astrometry.dec_j2000
        );
        let mut extra_links = vec![
            format!(r#"<a target="_blank" href="{simbad_by_source}">SIMBAD by Gaia Source</a>"#),
            format!(r#"<a target="_blank" href="{simbad_by_coord}">SIMBAD by coordinate</a>"#),
        ];
        if self.include_variability_link {
            let dispersions_url = format!(
                "{vizier_base}/viz-bin/VizieR-4?-source=J%2FA%2BA%2F677%2FA137%2Fcatalog&Source={source_id}"
            );
            extra_links.push(format!(
                r#"<a href="{dispersions_url}" target="_blank">Gaia DR3 Stellar Variability</a> [2023A&A...677A.137M]"#
            ));
        }

        DetailView { rows, extra_links }
    }
}

fn format_parallax(plx: Option<f64>) -> String {
    match plx {
        Some(plx) if plx > 0.0 => {
            let distance_pc = 1000.0 / plx;
            format!("{plx:.3} (~ {distance_pc:.0} pc)")
        }
        Some(plx) => format!("{plx:.3}"),
        None => String::new(),
    }
}

impl CatalogProvider for GaiaDr3TicProvider {
    fn label(&self) -> &str {
        "Gaia DR3"
    }

    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle {
            shape: MarkerShape::Circle,
            color: "#b22222",
            fill_alpha: 0.3,
        }
    }

    fn query_region(&self, cone: &ConeSearch) -> Result<Vec<CatalogSource>> {
        let table = self
            .vizier
            .query_region(GAIA_CATALOG, cone, GAIA_COLUMNS, &[])?;
        if table.is_empty() {
            return Err(CatalogError::NoSources("Vizier".to_string()));
        }

        let tic_by_gaia = self.query_tic_crossmatch(cone);

        let mut sources = Vec::new();
        for row in table.row_indices() {
            let gmag = match table.get_f64(row, "Gmag") {
                Some(gmag) if gmag < cone.magnitude_limit => gmag,
                _ => continue,
            };
            let (Some(ra), Some(dec)) = (
                table.get_f64(row, "RAJ2000"),
                table.get_f64(row, "DEJ2000"),
            ) else {
                continue;
            };
            let source_id = table.get(row, "Source").unwrap_or_default().to_string();
            let astrometry = Astrometry {
                ra_j2000: ra,
                dec_j2000: dec,
                pm_ra_mas_yr: table.get_f64(row, "pmRA"),
                pm_dec_mas_yr: table.get_f64(row, "pmDE"),
            };
            let plx = table.get_f64(row, "Plx");

            let mut tooltip = vec![
                ("Gaia Source".to_string(), source_id.clone()),
                ("Gmag".to_string(), format!("{gmag:.3}")),
                ("Parallax (mas)".to_string(), format_parallax(plx)),
            ];
            let tic = tic_by_gaia.get(&source_id);
            if let Some((tic_id, _)) = tic {
                tooltip.push(("TIC".to_string(), tic_id.clone()));
            }

            let extra: Vec<(String, Option<String>)> = self
                .extra_detail_columns
                .iter()
                .map(|(column, label)| {
                    (label.clone(), table.get(row, column).map(str::to_string))
                })
                .collect();

            sources.push(CatalogSource {
                astrometry,
                mag_for_size: gmag,
                detail: self.detail_view(&source_id, &astrometry, gmag, plx, tic, &extra),
                tooltip,
                lightcurve_url: None,
            });
        }

        if sources.is_empty() {
            return Err(CatalogError::TooFewSources(cone.magnitude_limit));
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const GAIA_TSV: &str = "\
#query result\n\
Source\tRAJ2000\tDEJ2000\tPlx\tpmRA\tpmDE\tGmag\tBP-RP\tRUWE\tsepsi\te_RV\tIPDfmp\tVarFlag\n\
\tdeg\tdeg\tmas\tmas/yr\tmas/yr\tmag\tmag\t\t\tkm/s\t\t\n\
------\t---\t---\t---\t---\t---\t---\t---\t---\t---\t---\t---\t---\n\
100\t10.00000000\t-20.00000000\t5.0\t12.5\t-3.5\t11.200\t0.75\t1.01\t1.2\t0.5\t0\tVARIABLE\n\
200\t10.01000000\t-20.01000000\t\t\t\t17.500\t\t\t\t\t\t\n\
300\t10.02000000\t-20.02000000\t2.0\t0.0\t0.0\t19.500\t\t\t\t\t\t\n";

    const TIC_TSV: &str = "\
TIC\tGAIA\tTmag\n\
---\t---\t---\n\
400000000\t100\t10.800\n";

    fn cone() -> ConeSearch {
        ConeSearch {
            ra_deg: 10.0,
            dec_deg: -20.0,
            radius_arcsec: 300.0,
            magnitude_limit: 18.0,
        }
    }

    fn mock_provider(server: &MockServer) -> GaiaDr3TicProvider {
        GaiaDr3TicProvider::new(VizierClient::with_base_url(server.base_url()))
    }

    #[test]
    fn queries_and_crossmatches() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/viz-bin/asu-tsv")
                .query_param("-source", GAIA_CATALOG);
            then.status(200).body(GAIA_TSV);
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/viz-bin/asu-tsv")
                .query_param("-source", TIC_CATALOG);
            then.status(200).body(TIC_TSV);
        });

        let sources = mock_provider(&server).query_region(&cone()).unwrap();
        // The Gmag 19.5 source is fainter than the limit.
        assert_eq!(sources.len(), 2);

        let first = &sources[0];
        assert_eq!(first.astrometry.pm_ra_mas_yr, Some(12.5));
        assert_eq!(first.tooltip[0], ("Gaia Source".to_string(), "100".to_string()));
        assert_eq!(first.tooltip[1].1, "11.200");
        // Parallax 5 mas is ~200 pc.
        assert!(first.tooltip[2].1.contains("200 pc"));
        assert!(first.tooltip.iter().any(|(k, v)| k == "TIC" && v == "400000000"));
        assert!(first
            .detail
            .rows
            .iter()
            .any(|(k, v)| k == "Tmag" && v == "10.800"));
        assert!(first
            .detail
            .extra_links
            .iter()
            .any(|l| l.contains("Stellar Variability")));

        // Second source has no TIC match and no parallax.
        let second = &sources[1];
        assert!(second.tooltip.iter().all(|(k, _)| k != "TIC"));
        assert_eq!(second.tooltip[2].1, "");
    }

    #[test]
    fn empty_table_is_no_sources() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/viz-bin/asu-tsv");
            then.status(200).body("#nothing\n");
        });
        let err = mock_provider(&server).query_region(&cone()).unwrap_err();
        assert!(matches!(err, CatalogError::NoSources(_)));
    }

    #[test]
    fn all_too_faint_is_too_few_sources() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/viz-bin/asu-tsv");
            then.status(200).body(GAIA_TSV);
        });
        let mut faint_cone = cone();
        faint_cone.magnitude_limit = 8.0;
        let err = mock_provider(&server).query_region(&faint_cone).unwrap_err();
        match err {
            CatalogError::TooFewSources(limit) => assert_eq!(limit, 8.0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tic_failure_degrades_gracefully() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/viz-bin/asu-tsv")
                .query_param("-source", GAIA_CATALOG);
            then.status(200).body(GAIA_TSV);
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/viz-bin/asu-tsv")
                .query_param("-source", TIC_CATALOG);
            then.status(500);
        });
        let sources = mock_provider(&server).query_region(&cone()).unwrap();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].tooltip.iter().all(|(k, _)| k != "TIC"));
    }

    #[test]
    fn variability_link_can_be_disabled() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/viz-bin/asu-tsv");
            then.status(200).body(GAIA_TSV);
        });
        let mut provider = mock_provider(&server);
        provider.include_variability_link = false;
        let sources = provider.query_region(&cone()).unwrap();
        assert!(sources[0]
            .detail
            .extra_links
            .iter()
            .all(|l| !l.contains("Stellar Variability")));
    }
}
