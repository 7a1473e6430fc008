//! TPF discovery and download: MAST product search with TessCut fallback.
//!
//! The search order follows the original workflow: resolve the TIC id to
//! coordinates, look for SPOC target-pixel products at MAST (dropping the
//! 20 s fast cadence, which always has a 2 min counterpart and only slows
//! things down here), and fall back to an 11x11 TessCut cutout when the
//! target was never a 2 min target in the requested sector.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use catalogs::VizierClient;
use serde_json::{json, Value};
use tempfile::Builder;
use tracing::{debug, info};
use url::Url;

use crate::cube::TargetPixelFile;
use crate::{Result, TpfError};

/// Default MAST host.
pub const DEFAULT_MAST_BASE: &str = "https://mast.stsci.edu";

const TIC_CATALOG: &str = "IV/39/tic82";

/// A TIC target resolved to coordinates.
#[derive(Debug, Clone, Copy)]
pub struct TicTarget {
    pub tic: u64,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub tmag: Option<f64>,
}

/// Resolve a TIC id via the TIC catalog on Vizier.
pub fn resolve_tic(vizier: &VizierClient, tic: u64) -> Result<TicTarget> {
    let table = vizier.query_constraints(
        TIC_CATALOG,
        &["TIC", "RAJ2000", "DEJ2000", "Tmag"],
        &[("TIC", tic.to_string())],
    )?;
    for row in table.row_indices() {
        if let (Some(ra), Some(dec)) = (
            table.get_f64(row, "RAJ2000"),
            table.get_f64(row, "DEJ2000"),
        ) {
            return Ok(TicTarget {
                tic,
                ra_deg: ra,
                dec_deg: dec,
                tmag: table.get_f64(row, "Tmag"),
            });
        }
    }
    Err(TpfError::TicNotFound(tic))
}

/// One SPOC timeseries observation at MAST.
#[derive(Debug, Clone, PartialEq)]
pub struct TpfObservation {
    pub obsid: String,
    pub sector: i64,
    pub exptime_s: f64,
}

/// Pick the observation to plot: requested sector, or the latest; the fast
/// cadence is excluded whenever more than one observation is on offer.
pub fn select_observation(
    mut observations: Vec<TpfObservation>,
    sector: Option<i64>,
) -> Option<TpfObservation> {
    if let Some(sector) = sector {
        observations.retain(|o| o.sector == sector);
    }
    if observations.len() > 1 {
        observations.retain(|o| o.exptime_s > 60.0);
    }
    observations.sort_by_key(|o| o.sector);
    observations.pop()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client for the MAST portal invoke API.
#[derive(Debug, Clone)]
pub struct MastClient {
    base_url: String,
}

impl Default for MastClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MastClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_MAST_BASE.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn invoke(&self, request: &Value) -> Result<Value> {
        let url = format!("{}/api/v0/invoke", self.base());
        debug!(%url, "MAST invoke");
        let mut response = ureq::post(&url)
            .send_form([("request", request.to_string().as_str())])
            .map_err(|e| TpfError::Http {
                url: url.clone(),
                source: Box::new(e),
            })?;
        response
            .body_mut()
            .read_json()
            .map_err(|e| TpfError::Http {
                url,
                source: Box::new(e),
            })
    }

    /// SPOC timeseries observations for a TIC target.
    pub fn search_tpf_observations(&self, tic: u64) -> Result<Vec<TpfObservation>> {
        let request = json!({
            "service": "Mast.Caom.Filtered",
            "format": "json",
            "params": {
                "columns": "obsid,sequence_number,t_exptime",
                "filters": [
                    { "paramName": "obs_collection", "values": ["TESS"] },
                    { "paramName": "dataproduct_type", "values": ["timeseries"] },
                    { "paramName": "provenance_name", "values": ["SPOC"] },
                    { "paramName": "target_name", "values": [tic.to_string()] },
                ],
            },
        });
        let response = self.invoke(&request)?;
        let rows = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| TpfError::Parse {
                service: "MAST".to_string(),
                detail: "missing data array in observation search".to_string(),
            })?;

        let mut observations = Vec::new();
        for row in rows {
            let (Some(obsid), Some(sector)) = (
                row.get("obsid").and_then(value_to_string),
                row.get("sequence_number").and_then(Value::as_i64),
            ) else {
                continue;
            };
            observations.push(TpfObservation {
                obsid,
                sector,
                exptime_s: row.get("t_exptime").and_then(Value::as_f64).unwrap_or(0.0),
            });
        }
        Ok(observations)
    }

    /// `dataURI` of the target-pixel product of an observation, if any.
    pub fn tpf_product_uri(&self, obsid: &str) -> Result<Option<String>> {
        let request = json!({
            "service": "Mast.Caom.Products",
            "format": "json",
            "params": { "obsid": obsid },
        });
        let response = self.invoke(&request)?;
        let rows = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| TpfError::Parse {
                service: "MAST".to_string(),
                detail: "missing data array in product list".to_string(),
            })?;
        Ok(rows.iter().find_map(|row| {
            let subgroup = row
                .get("productSubGroupDescription")
                .and_then(Value::as_str)?;
            if subgroup != "TP" {
                return None;
            }
            row.get("dataURI").and_then(value_to_string)
        }))
    }

    /// Download a MAST product by its `dataURI` to `dest`.
    pub fn download_file(&self, uri: &str, dest: &Path) -> Result<()> {
        let mut url = Url::parse(&format!("{}/api/v0.1/Download/file", self.base())).map_err(
            |e| TpfError::Parse {
                service: "MAST".to_string(),
                detail: format!("bad base URL {:?}: {e}", self.base_url),
            },
        )?;
        url.query_pairs_mut().append_pair("uri", uri);
        let url = String::from(url);
        debug!(%url, "MAST download");
        let mut response = ureq::get(&url).call().map_err(|e| TpfError::Http {
            url,
            source: Box::new(e),
        })?;
        // Cubes run to tens of megabytes; stream instead of buffering.
        let mut reader = response.body_mut().as_reader();
        let mut out = File::create(dest)?;
        std::io::copy(&mut reader, &mut out)?;
        Ok(())
    }
}

/// Client for the TessCut cutout service.
#[derive(Debug, Clone)]
pub struct TesscutClient {
    base_url: String,
}

impl Default for TesscutClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TesscutClient {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_MAST_BASE.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Sectors with TessCut coverage of a position.
    pub fn sectors(&self, ra_deg: f64, dec_deg: f64) -> Result<Vec<i64>> {
        let url = format!(
            "{}/tesscut/api/v0.1/sector?ra={ra_deg:.6}&dec={dec_deg:.6}",
            self.base()
        );
        debug!(%url, "TessCut sector query");
        let mut response = ureq::get(&url).call().map_err(|e| TpfError::Http {
            url: url.clone(),
            source: Box::new(e),
        })?;
        let body: Value = response
            .body_mut()
            .read_json()
            .map_err(|e| TpfError::Http {
                url,
                source: Box::new(e),
            })?;
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| TpfError::Parse {
                service: "TessCut".to_string(),
                detail: "missing results array in sector query".to_string(),
            })?;
        let mut sectors: Vec<i64> = results
            .iter()
            .filter_map(|r| {
                // Sector numbers arrive zero-padded as strings, e.g. "0014".
                match r.get("sector") {
                    Some(Value::String(s)) => s.trim_start_matches('0').parse().ok().or_else(|| {
                        if s.chars().all(|c| c == '0') && !s.is_empty() {
                            Some(0)
                        } else {
                            None
                        }
                    }),
                    Some(Value::Number(n)) => n.as_i64(),
                    _ => None,
                }
            })
            .collect();
        sectors.sort_unstable();
        sectors.dedup();
        Ok(sectors)
    }

    /// Download a cutout as a zip of FITS files and unpack the first cube
    /// into `dest`.
    pub fn download_cutout(
        &self,
        ra_deg: f64,
        dec_deg: f64,
        sector: i64,
        size: (u32, u32),
        dest: &Path,
    ) -> Result<()> {
        let url = format!(
            "{}/tesscut/api/v0.1/astrocut?ra={ra_deg:.6}&dec={dec_deg:.6}&y={}&x={}&sector={sector}",
            self.base(),
            size.1,
            size.0
        );
        debug!(%url, "TessCut cutout download");
        let mut response = ureq::get(&url).call().map_err(|e| TpfError::Http {
            url: url.clone(),
            source: Box::new(e),
        })?;
        let mut bytes = Vec::new();
        response.body_mut().as_reader().read_to_end(&mut bytes)?;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.name().ends_with(".fits") {
                let mut out = File::create(dest)?;
                std::io::copy(&mut entry, &mut out)?;
                return Ok(());
            }
        }
        Err(TpfError::Parse {
            service: "TessCut".to_string(),
            detail: format!("no FITS file in cutout archive from {url}"),
        })
    }
}

/// A fetched pixel cube with its provenance.
#[derive(Debug)]
pub struct TpfFetchResult {
    pub tpf: TargetPixelFile,
    pub sector: i64,
    /// Cadence exposure time when known (SPOC products only).
    pub exptime_s: Option<f64>,
    pub tesscut: bool,
    pub target: TicTarget,
}

/// Orchestrates resolve, search, fallback and download.
#[derive(Debug, Clone)]
pub struct TpfFetcher {
    pub mast: MastClient,
    pub tesscut: TesscutClient,
    pub vizier: VizierClient,
    /// TessCut stamp size, columns x rows.
    pub cutout_size: (u32, u32),
}

impl Default for TpfFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TpfFetcher {
    pub fn new() -> Self {
        Self {
            mast: MastClient::new(),
            tesscut: TesscutClient::new(),
            vizier: VizierClient::new(),
            // OPEN: a fixed stamp is too small for very bright stars.
            cutout_size: (11, 11),
        }
    }

    /// Fetch the pixel cube for a target, or None when neither a SPOC
    /// product nor TessCut coverage exists.
    pub fn get_tpf(&self, tic: u64, sector: Option<i64>) -> Result<Option<TpfFetchResult>> {
        let target = resolve_tic(&self.vizier, tic)?;

        if let Some(result) = self.try_spoc(&target, sector)? {
            return Ok(Some(result));
        }

        debug!(tic, ?sector, "no SPOC target pixel file; trying TessCut");
        self.try_tesscut(&target, sector)
    }

    fn try_spoc(&self, target: &TicTarget, sector: Option<i64>) -> Result<Option<TpfFetchResult>> {
        let observations = self.mast.search_tpf_observations(target.tic)?;
        let Some(observation) = select_observation(observations, sector) else {
            return Ok(None);
        };
        let Some(uri) = self.mast.tpf_product_uri(&observation.obsid)? else {
            return Ok(None);
        };

        let file = Builder::new().suffix(".fits").tempfile()?;
        self.mast.download_file(&uri, file.path())?;
        let tpf = TargetPixelFile::open(file.path())?;
        info!(
            tic = target.tic,
            sector = observation.sector,
            exptime = observation.exptime_s,
            "loaded SPOC target pixel file"
        );
        Ok(Some(TpfFetchResult {
            tpf,
            sector: observation.sector,
            exptime_s: Some(observation.exptime_s),
            tesscut: false,
            target: *target,
        }))
    }

    fn try_tesscut(
        &self,
        target: &TicTarget,
        sector: Option<i64>,
    ) -> Result<Option<TpfFetchResult>> {
        let available = self.tesscut.sectors(target.ra_deg, target.dec_deg)?;
        let chosen = match sector {
            Some(s) if available.contains(&s) => s,
            Some(_) => return Ok(None),
            None => match available.last() {
                Some(&s) => s,
                None => return Ok(None),
            },
        };

        let file = Builder::new().suffix(".fits").tempfile()?;
        self.tesscut.download_cutout(
            target.ra_deg,
            target.dec_deg,
            chosen,
            self.cutout_size,
            file.path(),
        )?;
        let tpf = TargetPixelFile::open(file.path())?;
        info!(tic = target.tic, sector = chosen, "loaded TessCut cutout");
        Ok(Some(TpfFetchResult {
            tpf,
            sector: chosen,
            exptime_s: None,
            tesscut: true,
            target: *target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn obs(obsid: &str, sector: i64, exptime_s: f64) -> TpfObservation {
        TpfObservation {
            obsid: obsid.to_string(),
            sector,
            exptime_s,
        }
    }

    #[test]
    fn select_prefers_requested_sector() {
        let observations = vec![obs("a", 14, 120.0), obs("b", 41, 120.0)];
        let chosen = select_observation(observations, Some(14)).unwrap();
        assert_eq!(chosen.obsid, "a");
    }

    #[test]
    fn select_latest_sector_by_default() {
        let observations = vec![obs("a", 14, 120.0), obs("b", 41, 120.0)];
        let chosen = select_observation(observations, None).unwrap();
        assert_eq!(chosen.sector, 41);
    }

    #[test]
    fn fast_cadence_excluded_when_alternatives_exist() {
        let observations = vec![obs("fast", 41, 20.0), obs("slow", 41, 120.0)];
        let chosen = select_observation(observations, None).unwrap();
        assert_eq!(chosen.obsid, "slow");
    }

    #[test]
    fn single_fast_cadence_survives() {
        let observations = vec![obs("fast", 41, 20.0)];
        let chosen = select_observation(observations, None).unwrap();
        assert_eq!(chosen.obsid, "fast");
    }

    #[test]
    fn missing_sector_selects_nothing() {
        let observations = vec![obs("a", 14, 120.0)];
        assert!(select_observation(observations, Some(99)).is_none());
    }

    #[test]
    fn resolve_tic_parses_position() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/viz-bin/asu-tsv")
                .query_param("TIC", "261136679");
            then.status(200).body(
                "TIC\tRAJ2000\tDEJ2000\tTmag\n---\t---\t---\t---\n261136679\t104.90128\t23.48087\t10.52\n",
            );
        });
        let vizier = VizierClient::with_base_url(server.base_url());
        let target = resolve_tic(&vizier, 261_136_679).unwrap();
        assert_eq!(target.tic, 261_136_679);
        assert!((target.ra_deg - 104.90128).abs() < 1e-9);
        assert_eq!(target.tmag, Some(10.52));
    }

    #[test]
    fn resolve_unknown_tic_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/viz-bin/asu-tsv");
            then.status(200).body("#no rows\n");
        });
        let vizier = VizierClient::with_base_url(server.base_url());
        assert!(matches!(
            resolve_tic(&vizier, 1).unwrap_err(),
            TpfError::TicNotFound(1)
        ));
    }

    #[test]
    fn observation_search_parses_rows() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v0/invoke");
            then.status(200).json_body(serde_json::json!({
                "status": "COMPLETE",
                "data": [
                    { "obsid": 17000012345u64, "sequence_number": 41, "t_exptime": 120.0 },
                    { "obsid": "17000054321", "sequence_number": 41, "t_exptime": 20.0 },
                    { "obsid": "bad", "sequence_number": null },
                ],
            }));
        });
        let mast = MastClient::with_base_url(server.base_url());
        let observations = mast.search_tpf_observations(261_136_679).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].obsid, "17000012345");
        assert_eq!(observations[1].exptime_s, 20.0);
    }

    #[test]
    fn product_uri_picks_tp_subgroup() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v0/invoke");
            then.status(200).json_body(serde_json::json!({
                "data": [
                    { "productSubGroupDescription": "LC", "dataURI": "mast:TESS/lc.fits" },
                    { "productSubGroupDescription": "TP", "dataURI": "mast:TESS/tp.fits" },
                ],
            }));
        });
        let mast = MastClient::with_base_url(server.base_url());
        let uri = mast.tpf_product_uri("17000012345").unwrap();
        assert_eq!(uri.as_deref(), Some("mast:TESS/tp.fits"));
    }

    #[test]
    fn tesscut_sector_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/tesscut/api/v0.1/sector");
            then.status(200).json_body(serde_json::json!({
                "results": [
                    { "sectorName": "tess-s0014-4-1", "sector": "0014", "camera": "4", "ccd": "1" },
                    { "sectorName": "tess-s0041-2-3", "sector": "0041", "camera": "2", "ccd": "3" },
                ],
            }));
        });
        let tesscut = TesscutClient::with_base_url(server.base_url());
        let sectors = tesscut.sectors(104.9, 23.48).unwrap();
        assert_eq!(sectors, vec![14, 41]);
    }

    #[test]
    fn tesscut_empty_coverage() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/tesscut/api/v0.1/sector");
            then.status(200).json_body(serde_json::json!({ "results": [] }));
        });
        let tesscut = TesscutClient::with_base_url(server.base_url());
        assert!(tesscut.sectors(104.9, 23.48).unwrap().is_empty());
    }
}
