//! Route handlers and page assembly.
//!
//! Catalog and archive calls are blocking, so each request is rendered on
//! the blocking pool. Per-catalog failures degrade to inline error banners;
//! a page with a dead catalog is still a useful page.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use catalogs::{
    CatalogProvider, ConeSearch, GaiaDr3TicProvider, VizierClient, VsxProvider,
    ZtfObjectsProvider,
};
use lightcurve::{read_ztf_csv, Epoch, LightCurve, ZtfReadOptions};
use tpf::{TpfFetchResult, TpfFetcher};
use tracing::{info, warn};

use crate::figures::{self, Marker, SkyviewOverlay};
use crate::page::{self, SourceRow, APP_TITLE};
use crate::params::{LightCurveParams, SkyViewParams};

/// Fallback faint limit when the target has no catalog Tmag.
const DEFAULT_MAGNITUDE_LIMIT: f64 = 18.0;
/// Faint limit offset relative to the target's Tmag.
const MAGNITUDE_LIMIT_OFFSET: f64 = 7.0;
/// TESS plate scale, used to size the cone search when a cube has no WCS.
const TESS_PIXEL_ARCSEC: f64 = 21.0;

/// Shared clients; cheap to build, cloned into the blocking pool per request.
pub struct AppState {
    pub fetcher: TpfFetcher,
    pub providers: Vec<Box<dyn CatalogProvider>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            fetcher: TpfFetcher::new(),
            providers: vec![
                Box::new(GaiaDr3TicProvider::new(VizierClient::new())),
                Box::new(ZtfObjectsProvider::new()),
                Box::new(VsxProvider::new()),
            ],
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(skyview_page))
        .route("/lightcurve", get(lightcurve_page))
        .with_state(state)
}

async fn skyview_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Html<String> {
    let params = SkyViewParams::from_query(&query);
    let html = tokio::task::spawn_blocking(move || render_skyview(&state, params))
        .await
        .unwrap_or_else(|e| {
            page::page(APP_TITLE, &page::error_box(&format!("internal error: {e}")))
        });
    Html(html)
}

async fn lightcurve_page(Query(query): Query<HashMap<String, String>>) -> Html<String> {
    let params = LightCurveParams::from_query(&query);
    let html = tokio::task::spawn_blocking(move || render_lightcurve(params))
        .await
        .unwrap_or_else(|e| {
            page::page(APP_TITLE, &page::error_box(&format!("internal error: {e}")))
        });
    Html(html)
}

fn render_skyview(state: &AppState, params: SkyViewParams) -> String {
    let mut body = format!(
        "<h1>{}</h1>{}",
        page::escape(APP_TITLE),
        page::search_form(&params)
    );
    let Some(tic) = params.tic else {
        body.push_str(
            "<p>Enter a TIC number to view its pixel stamp and nearby catalog sources.</p>",
        );
        body.push_str(&lightcurve_section());
        return page::page(APP_TITLE, &body);
    };

    let fetched = match state.fetcher.get_tpf(tic, params.sector) {
        Ok(Some(fetched)) => fetched,
        Ok(None) => {
            let sector_note = params
                .sector
                .map(|s| format!(" sector {s}"))
                .unwrap_or_default();
            body.push_str(&page::note_box(&format!(
                "Cannot find pixel data for TIC {tic}{sector_note}."
            )));
            body.push_str(&lightcurve_section());
            return page::page(APP_TITLE, &body);
        }
        Err(e) => {
            warn!(tic, error = %e, "target pixel fetch failed");
            body.push_str(&page::error_box(&format!("TIC {tic}: {e}")));
            body.push_str(&lightcurve_section());
            return page::page(APP_TITLE, &body);
        }
    };

    let magnitude_limit = params.magnitude_limit.unwrap_or_else(|| {
        default_magnitude_limit(fetched.tpf.meta.tess_mag, fetched.target.tmag)
    });
    info!(
        "Plot: TIC {tic}, sector {}, magnitude_limit {magnitude_limit:.1}",
        fetched.sector
    );

    let tpf = &fetched.tpf;
    let (rows, cols) = tpf.shape();
    let half_diagonal = ((rows * rows + cols * cols) as f64).sqrt() / 2.0;
    let (center_ra, center_dec, radius_arcsec) = match &tpf.wcs {
        Some(wcs) => {
            let (ra, dec) =
                wcs.pixel_to_world((cols as f64 - 1.0) / 2.0, (rows as f64 - 1.0) / 2.0);
            (ra, dec, wcs.pixel_scale_arcsec() * half_diagonal)
        }
        None => (
            fetched.target.ra_deg,
            fetched.target.dec_deg,
            TESS_PIXEL_ARCSEC * half_diagonal,
        ),
    };
    let cone = ConeSearch {
        ra_deg: center_ra,
        dec_deg: center_dec,
        radius_arcsec,
        magnitude_limit,
    };
    let epoch_jyear = tpf.epoch_jyear();

    let mut overlays = Vec::new();
    let mut sections = Vec::new();
    for provider in &state.providers {
        match provider.query_region(&cone) {
            Ok(sources) => {
                let style = provider.marker_style();
                let mut markers = Vec::new();
                let mut table_rows = Vec::with_capacity(sources.len());
                for source in &sources {
                    let pixel = tpf.wcs.as_ref().and_then(|wcs| {
                        let (ra, dec) = source.astrometry.position_at(epoch_jyear);
                        wcs.world_to_pixel(ra, dec)
                    });
                    if let Some((x, y)) = pixel {
                        let on_stamp = (-0.5..=cols as f64 - 0.5).contains(&x)
                            && (-0.5..=rows as f64 - 0.5).contains(&y);
                        if on_stamp {
                            markers.push(Marker {
                                x,
                                y,
                                radius: figures::marker_radius(
                                    source.mag_for_size,
                                    magnitude_limit,
                                ),
                            });
                        }
                    }
                    table_rows.push(SourceRow {
                        tooltip: source.tooltip.clone(),
                        pixel,
                        ra_deg: source.astrometry.ra_j2000,
                        dec_deg: source.astrometry.dec_j2000,
                        separation_arcsec: cone
                            .separation_arcsec(source.astrometry.ra_j2000, source.astrometry.dec_j2000),
                        detail_html: page::detail_fragment(&source.detail),
                        lightcurve_href: source
                            .lightcurve_url
                            .as_ref()
                            .map(|url| format!("/lightcurve?url={}", urlencoding::encode(url))),
                    });
                }
                overlays.push(SkyviewOverlay {
                    label: provider.label().to_string(),
                    style,
                    markers,
                });
                sections.push(page::source_section(provider.label(), style.color, &table_rows));
            }
            Err(e) => {
                warn!(provider = provider.label(), error = %e, "catalog query failed");
                sections.push(page::error_box(&format!("{}: {e}", provider.label())));
            }
        }
    }

    let title = skyview_title(tic, &fetched);
    // TessCut cutouts carry an all-zero aperture image; skip the outline.
    let aperture = if fetched.tesscut {
        None
    } else {
        Some(tpf.pipeline_mask())
    };
    match figures::render_skyview_svg(&tpf.display_frame(), aperture.as_ref(), &overlays, &title) {
        Ok(svg) => body.push_str(&svg),
        Err(e) => body.push_str(&page::error_box(&format!("pixel figure: {e}"))),
    }
    if tpf.wcs.is_none() {
        body.push_str(&page::note_box(
            "This cube has no usable WCS, so catalog markers cannot be placed on the stamp.",
        ));
    }
    for section in &sections {
        body.push_str(section);
    }
    body.push_str(&lightcurve_section());

    page::page(&format!("TIC {tic} | {APP_TITLE}"), &body)
}

/// Default faint limit for the catalog queries: TESSMAG + 7, falling back
/// to the TIC Tmag, then to 18 when neither is usable. TessCut cutouts
/// carry a missing or zero TESSMAG header.
fn default_magnitude_limit(header_tmag: Option<f64>, tic_tmag: Option<f64>) -> f64 {
    let usable = |t: &f64| t.is_finite() && *t > 0.0;
    header_tmag
        .filter(usable)
        .or(tic_tmag.filter(usable))
        .map(|t| t + MAGNITUDE_LIMIT_OFFSET)
        .unwrap_or(DEFAULT_MAGNITUDE_LIMIT)
}

/// The light-curve viewer form embedded at the bottom of the skyview page.
fn lightcurve_section() -> String {
    format!(
        "<h2>Light curve</h2>{}",
        page::lightcurve_form(&LightCurveParams::from_query(&HashMap::new()))
    )
}

fn skyview_title(tic: u64, fetched: &TpfFetchResult) -> String {
    let name = fetched
        .tpf
        .meta
        .object
        .clone()
        .unwrap_or_else(|| format!("TIC {tic}"));
    let origin = if fetched.tesscut { " (TessCut)" } else { "" };
    format!("{name}, sector {}{origin}", fetched.sector)
}

fn lightcurve_title(curve: &LightCurve, period_days: Option<f64>) -> String {
    let mut title = if curve.label.is_empty() {
        "Light curve".to_string()
    } else {
        curve.label.clone()
    };
    let filters = curve.filters();
    if !filters.is_empty() {
        title.push_str(&format!(" ({})", filters.join(", ")));
    }
    if let Some(period) = period_days {
        title.push_str(&format!(", P = {period} d"));
    }
    title
}

fn render_lightcurve(params: LightCurveParams) -> String {
    let mut body = format!(
        "<h1>{}</h1>{}",
        page::escape("Light curve viewer"),
        page::lightcurve_form(&params)
    );
    let Some(url) = params.url.clone() else {
        body.push_str("<p>Paste a ZTF light-curve CSV export URL to plot it.</p>");
        return page::page(APP_TITLE, &body);
    };

    let curve = match fetch_curve(&url) {
        Ok(curve) => curve,
        Err(message) => {
            warn!(%url, error = %message, "light curve load failed");
            body.push_str(&page::error_box(&message));
            if !url.contains("irsa.ipac.caltech.edu") {
                body.push_str(&page::note_box(
                    "This does not look like a ZTF light-curve URL; only IRSA CSV exports are supported.",
                ));
            }
            return page::page(APP_TITLE, &body);
        }
    };
    info!(
        "Plot: light curve {} ({} samples), period {:?}",
        curve.label,
        curve.len(),
        params.period_days
    );

    let figure = match params.period_days {
        Some(period) => {
            let epoch = params.epoch.map(|v| Epoch::new(v, params.epoch_format));
            curve
                .fold(period, epoch)
                .map_err(|e| e.to_string())
                .and_then(|folded| {
                    figures::render_folded_svg(
                        &folded,
                        curve.time_format.label(),
                        &lightcurve_title(&curve, Some(period)),
                        params.cmap,
                    )
                    .map_err(|e| e.to_string())
                })
        }
        None => figures::render_lightcurve_svg(&curve, &lightcurve_title(&curve, None))
            .map_err(|e| e.to_string()),
    };
    match figure {
        Ok(svg) => body.push_str(&svg),
        Err(message) => body.push_str(&page::error_box(&message)),
    }

    page::page(APP_TITLE, &body)
}

/// Fetch and parse a ZTF CSV export. Errors come back as display strings
/// since they all end up in the same inline banner.
fn fetch_curve(url: &str) -> Result<LightCurve, String> {
    let mut response = ureq::get(url)
        .call()
        .map_err(|e| format!("could not fetch {url}: {e}"))?;
    let csv = response
        .body_mut()
        .read_to_string()
        .map_err(|e| format!("could not read {url}: {e}"))?;
    read_ztf_csv(csv.as_bytes(), url, &ZtfReadOptions::default())
        .map_err(|e| format!("could not parse {url}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightcurve::{Sample, TimeFormat};

    fn curve_with_filters(filters: &[&str]) -> LightCurve {
        let samples = filters
            .iter()
            .enumerate()
            .map(|(i, f)| Sample {
                time_jd: 2_458_000.0 + i as f64,
                mag: 15.0,
                mag_err: 0.02,
                filter: Some(f.to_string()),
            })
            .collect();
        let mut curve = LightCurve::new(samples, TimeFormat::Jd);
        curve.label = "ZTF OID 686103400067717".to_string();
        curve
    }

    #[test]
    fn title_lists_filters_and_period() {
        let curve = curve_with_filters(&["zr", "zg", "zr"]);
        assert_eq!(
            lightcurve_title(&curve, Some(1.25)),
            "ZTF OID 686103400067717 (zg, zr), P = 1.25 d"
        );
    }

    #[test]
    fn title_without_period_or_label() {
        let curve = LightCurve::new(Vec::new(), TimeFormat::Jd);
        assert_eq!(lightcurve_title(&curve, None), "Light curve");
    }

    #[test]
    fn magnitude_limit_from_header() {
        assert_eq!(default_magnitude_limit(Some(10.5), None), 17.5);
        assert_eq!(default_magnitude_limit(Some(10.5), Some(9.0)), 17.5);
    }

    #[test]
    fn magnitude_limit_zero_header_falls_back_to_tic() {
        assert_eq!(default_magnitude_limit(Some(0.0), Some(9.0)), 16.0);
    }

    #[test]
    fn magnitude_limit_without_any_tmag() {
        assert_eq!(default_magnitude_limit(None, None), 18.0);
        assert_eq!(default_magnitude_limit(Some(0.0), None), 18.0);
        assert_eq!(default_magnitude_limit(Some(f64::NAN), None), 18.0);
    }
}
