//! Target Pixel File access for the skyview application.
//!
//! Covers target resolution (TIC id to coordinates), product search at MAST
//! with a TessCut cutout fallback, FITS cube reading, and the tangent-plane
//! WCS used to place catalog sources on the pixel stamp.

use thiserror::Error;

pub mod cube;
pub mod search;
pub mod wcs;

pub use cube::{TargetPixelFile, TpfMeta};
pub use search::{MastClient, TesscutClient, TicTarget, TpfFetchResult, TpfFetcher};
pub use wcs::TanWcs;

/// Errors from TPF search, download and reading.
#[derive(Debug, Error)]
pub enum TpfError {
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::compat::errors::Error),

    #[error("HTTP error querying {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Failed to parse {service} response: {detail}")]
    Parse { service: String, detail: String },

    #[error("TIC {0} not found")]
    TicNotFound(u64),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Catalog(#[from] catalogs::CatalogError),

    #[error("Malformed pixel file: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, TpfError>;
