//! Catalog provider adapters for the skyview application.
//!
//! Each provider issues one cone-search query against a remote service
//! (Vizier, the AAVSO VSX JSON API, IRSA's TAP service), reshapes the result
//! into [`CatalogSource`] records with J2000 astrometry and preformatted
//! tooltip/detail text, and declares how its markers should be drawn.

use thiserror::Error;

pub mod gaia_tic;
pub mod provider;
pub mod vizier;
pub mod vsx;
pub mod ztf;

pub use gaia_tic::GaiaDr3TicProvider;
pub use provider::{
    Astrometry, CatalogProvider, CatalogSource, ConeSearch, DetailView, MarkerShape, MarkerStyle,
};
pub use vizier::VizierClient;
pub use vsx::VsxProvider;
pub use ztf::ZtfObjectsProvider;

/// Errors from catalog queries and response parsing.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The service answered but the region held nothing (or the service is
    /// silently degraded; the two are indistinguishable from the response).
    #[error("Either no sources were found in the query region or {0} is unavailable")]
    NoSources(String),

    #[error("No sources found brighter than {0:.1}")]
    TooFewSources(f64),

    #[error("HTTP error querying {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Failed to parse {service} response: {detail}")]
    Parse { service: String, detail: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
