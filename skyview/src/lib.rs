//! Web front end for the TESS pixel skyview.
//!
//! Serves two pages. `GET /` renders a target pixel stamp with catalog
//! overlays (Gaia DR3 crossmatched against the TIC, ZTF objects, VSX
//! variables). `GET /lightcurve` plots a ZTF light-curve CSV export, with
//! optional phase folding. Both pages are stateless: every view is fully
//! described by its query string, so results can be bookmarked and shared.

pub mod app;
pub mod figures;
pub mod page;
pub mod params;

pub use app::{router, AppState};
pub use params::{LightCurveParams, SkyViewParams};
