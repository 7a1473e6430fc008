//! Common types for catalog providers.

use crate::Result;

/// Reference epoch for catalog positions, as a Julian year.
pub const J2000_JYEAR: f64 = 2000.0;

/// A cone search request around a sky position.
#[derive(Debug, Clone, Copy)]
pub struct ConeSearch {
    /// Center right ascension, ICRS degrees.
    pub ra_deg: f64,
    /// Center declination, ICRS degrees.
    pub dec_deg: f64,
    /// Search radius in arcseconds.
    pub radius_arcsec: f64,
    /// Keep only sources brighter than this magnitude.
    pub magnitude_limit: f64,
}

impl ConeSearch {
    pub fn radius_deg(&self) -> f64 {
        self.radius_arcsec / 3600.0
    }

    /// Great-circle separation from the cone center in arcseconds.
    ///
    /// Haversine form, stable at the small angles involved here.
    pub fn separation_arcsec(&self, ra_deg: f64, dec_deg: f64) -> f64 {
        let (ra1, dec1) = (self.ra_deg.to_radians(), self.dec_deg.to_radians());
        let (ra2, dec2) = (ra_deg.to_radians(), dec_deg.to_radians());
        let sin_ddec = ((dec2 - dec1) / 2.0).sin();
        let sin_dra = ((ra2 - ra1) / 2.0).sin();
        let h = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
        2.0 * h.sqrt().asin().to_degrees() * 3600.0
    }
}

/// Catalog astrometry: a J2000 position plus optional proper motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Astrometry {
    /// Right ascension at J2000, degrees.
    pub ra_j2000: f64,
    /// Declination at J2000, degrees.
    pub dec_j2000: f64,
    /// Proper motion in RA (mu_alpha * cos delta), mas/yr.
    pub pm_ra_mas_yr: Option<f64>,
    /// Proper motion in Dec, mas/yr.
    pub pm_dec_mas_yr: Option<f64>,
}

impl Astrometry {
    pub fn fixed(ra_j2000: f64, dec_j2000: f64) -> Self {
        Self {
            ra_j2000,
            dec_j2000,
            pm_ra_mas_yr: None,
            pm_dec_mas_yr: None,
        }
    }

    /// Position propagated to `epoch_jyear`, degrees.
    ///
    /// Proper motion in RA is the on-sky rate (mu_alpha * cos delta), so the
    /// RA shift is divided by cos delta. Sources without proper motion keep
    /// their catalog position.
    pub fn position_at(&self, epoch_jyear: f64) -> (f64, f64) {
        let dt_years = epoch_jyear - J2000_JYEAR;
        let pm_ra = self.pm_ra_mas_yr.filter(|v| v.is_finite()).unwrap_or(0.0);
        let pm_dec = self.pm_dec_mas_yr.filter(|v| v.is_finite()).unwrap_or(0.0);
        let cos_dec = self.dec_j2000.to_radians().cos().max(1e-9);
        let ra = self.ra_j2000 + pm_ra * dt_years / 3_600_000.0 / cos_dec;
        let dec = self.dec_j2000 + pm_dec * dt_years / 3_600_000.0;
        (ra, dec)
    }
}

/// Marker glyph drawn for a provider's sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Cross,
}

/// Per-provider marker styling for the skyview figure.
#[derive(Debug, Clone, Copy)]
pub struct MarkerStyle {
    pub shape: MarkerShape,
    /// CSS-style hex color, e.g. `#b22222`.
    pub color: &'static str,
    /// Fill opacity for filled shapes, 0..=1.
    pub fill_alpha: f64,
}

/// Detail rows and outbound links shown when a source is selected.
#[derive(Debug, Clone, Default)]
pub struct DetailView {
    /// Label/value rows; values may contain pre-built HTML links.
    pub rows: Vec<(String, String)>,
    /// Extra standalone HTML links shown under the rows.
    pub extra_links: Vec<String>,
}

/// One catalog source, reshaped into the form the skyview page needs.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub astrometry: Astrometry,
    /// Magnitude used to scale the marker (NaN for fixed-size markers).
    pub mag_for_size: f64,
    /// Preformatted label/value rows for the hover tooltip. Position rows
    /// (separation, RA/DEC, pixel column/row) are appended by the renderer.
    pub tooltip: Vec<(String, String)>,
    pub detail: DetailView,
    /// Light-curve CSV export URL usable by the light-curve viewer.
    pub lightcurve_url: Option<String>,
}

/// A catalog adapter: one cone query, one reshape.
pub trait CatalogProvider: Send + Sync {
    /// Short label used in section headers and log lines.
    fn label(&self) -> &str;

    /// Marker styling for this provider's sources.
    fn marker_style(&self) -> MarkerStyle;

    /// Issue the cone search and reshape the response.
    fn query_region(&self, cone: &ConeSearch) -> Result<Vec<CatalogSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_at_without_pm_is_catalog_position() {
        let a = Astrometry::fixed(120.0, -45.0);
        let (ra, dec) = a.position_at(2019.5);
        assert_relative_eq!(ra, 120.0);
        assert_relative_eq!(dec, -45.0);
    }

    #[test]
    fn position_at_applies_proper_motion() {
        // 3600 mas/yr in dec over 10 years moves 0.01 degrees.
        let a = Astrometry {
            ra_j2000: 10.0,
            dec_j2000: 0.0,
            pm_ra_mas_yr: Some(0.0),
            pm_dec_mas_yr: Some(3600.0),
        };
        let (ra, dec) = a.position_at(2010.0);
        assert_relative_eq!(ra, 10.0);
        assert_relative_eq!(dec, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn ra_shift_scales_with_cos_dec() {
        let a = Astrometry {
            ra_j2000: 10.0,
            dec_j2000: 60.0,
            pm_ra_mas_yr: Some(3600.0),
            pm_dec_mas_yr: Some(0.0),
        };
        let (ra, _) = a.position_at(2010.0);
        // cos(60 deg) = 0.5, so the RA coordinate moves twice the on-sky rate.
        assert_relative_eq!(ra - 10.0, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn nan_proper_motion_is_ignored() {
        let a = Astrometry {
            ra_j2000: 10.0,
            dec_j2000: 20.0,
            pm_ra_mas_yr: Some(f64::NAN),
            pm_dec_mas_yr: None,
        };
        let (ra, dec) = a.position_at(2020.0);
        assert_relative_eq!(ra, 10.0);
        assert_relative_eq!(dec, 20.0);
    }

    #[test]
    fn separation_matches_small_angle() {
        let cone = ConeSearch {
            ra_deg: 100.0,
            dec_deg: 0.0,
            radius_arcsec: 300.0,
            magnitude_limit: 18.0,
        };
        // 0.01 deg offset in dec is 36 arcsec.
        let sep = cone.separation_arcsec(100.0, 0.01);
        assert_relative_eq!(sep, 36.0, epsilon = 1e-6);
    }

    #[test]
    fn radius_conversions() {
        let cone = ConeSearch {
            ra_deg: 0.0,
            dec_deg: 0.0,
            radius_arcsec: 90.0,
            magnitude_limit: 18.0,
        };
        assert_relative_eq!(cone.radius_deg(), 0.025);
    }
}
