//! Server-side figure rendering.
//!
//! Figures are drawn to in-memory SVG strings and inlined into the page, so
//! a view needs no asset round trips and survives being saved to disk.

mod lightcurve;
mod skyview;

pub use lightcurve::{render_folded_svg, render_lightcurve_svg};
pub use skyview::{render_skyview_svg, Marker, SkyviewOverlay};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("figure rendering failed: {0}")]
    Render(String),
    #[error("nothing to plot: {0}")]
    Empty(String),
}

pub(crate) fn render_err(e: impl std::fmt::Display) -> FigureError {
    FigureError::Render(e.to_string())
}

/// Marker radius in screen pixels, scaled so brighter sources draw larger.
/// Sources without a usable magnitude get a fixed mid-size marker.
pub fn marker_radius(mag_for_size: f64, magnitude_limit: f64) -> u32 {
    if !mag_for_size.is_finite() {
        return 4;
    }
    let radius = 2.0 + 1.3 * (magnitude_limit - mag_for_size);
    radius.clamp(2.0, 14.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brighter_sources_get_larger_markers() {
        let bright = marker_radius(10.0, 18.0);
        let faint = marker_radius(17.0, 18.0);
        assert!(bright > faint);
    }

    #[test]
    fn marker_radius_is_clamped() {
        assert_eq!(marker_radius(2.0, 18.0), 14);
        assert_eq!(marker_radius(25.0, 18.0), 2);
    }

    #[test]
    fn nan_magnitude_gets_fixed_size() {
        assert_eq!(marker_radius(f64::NAN, 18.0), 4);
    }
}
