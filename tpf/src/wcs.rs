//! Linear tangent-plane (TAN) WCS.
//!
//! TESS pixel stamps carry a plain gnomonic projection: a CD matrix maps
//! pixel offsets from the reference pixel to intermediate world coordinates
//! (xi, eta) in degrees, which project onto the sphere about
//! (CRVAL1, CRVAL2). Distortion conventions (SIP, TPV) are out of scope;
//! the stamps handled here are a few dozen pixels across and the linear
//! term is all that matters at that scale.

use crate::{Result, TpfError};

/// A TAN projection defined by the standard FITS cards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TanWcs {
    /// Reference RA, degrees.
    pub crval1: f64,
    /// Reference Dec, degrees.
    pub crval2: f64,
    /// Reference pixel column, 1-based per FITS convention.
    pub crpix1: f64,
    /// Reference pixel row, 1-based.
    pub crpix2: f64,
    /// CD matrix, degrees per pixel: `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`.
    pub cd: [[f64; 2]; 2],
}

impl TanWcs {
    pub fn new(crval: (f64, f64), crpix: (f64, f64), cd: [[f64; 2]; 2]) -> Result<Self> {
        let det = cd[0][0] * cd[1][1] - cd[0][1] * cd[1][0];
        if det == 0.0 || !det.is_finite() {
            return Err(TpfError::Malformed(format!(
                "singular CD matrix: {cd:?}"
            )));
        }
        Ok(Self {
            crval1: crval.0,
            crval2: crval.1,
            crpix1: crpix.0,
            crpix2: crpix.1,
            cd,
        })
    }

    /// Pixel scale in arcsec/pixel, from the CD matrix determinant.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt() * 3600.0
    }

    /// Project (ra, dec) in degrees to zero-based pixel (x=column, y=row).
    ///
    /// Returns None for directions on the far hemisphere.
    pub fn world_to_pixel(&self, ra_deg: f64, dec_deg: f64) -> Option<(f64, f64)> {
        let ra0 = self.crval1.to_radians();
        let dec0 = self.crval2.to_radians();
        let ra = ra_deg.to_radians();
        let dec = dec_deg.to_radians();

        let cos_c =
            dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * (ra - ra0).cos();
        if cos_c <= 0.0 {
            return None;
        }
        let xi = (dec.cos() * (ra - ra0).sin() / cos_c).to_degrees();
        let eta = ((dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * (ra - ra0).cos()) / cos_c)
            .to_degrees();

        // Invert the CD matrix: (xi, eta) = CD * (px - crpix).
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        let du = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dv = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;

        // FITS pixels are 1-based; callers work zero-based.
        Some((du + self.crpix1 - 1.0, dv + self.crpix2 - 1.0))
    }

    /// Inverse projection: zero-based pixel (x, y) to (ra, dec) degrees.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> (f64, f64) {
        let du = x - (self.crpix1 - 1.0);
        let dv = y - (self.crpix2 - 1.0);
        let xi = (self.cd[0][0] * du + self.cd[0][1] * dv).to_radians();
        let eta = (self.cd[1][0] * du + self.cd[1][1] * dv).to_radians();

        let ra0 = self.crval1.to_radians();
        let dec0 = self.crval2.to_radians();
        let denom = dec0.cos() - eta * dec0.sin();
        let dra = xi.atan2(denom);
        let ra = ra0 + dra;
        let dec = ((dec0.sin() + eta * dec0.cos()) * dra.cos() / denom).atan();

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 21 arcsec/pixel, the TESS plate scale, axis-aligned.
    fn tess_like() -> TanWcs {
        let scale = 21.0 / 3600.0;
        TanWcs::new((120.0, -30.0), (6.0, 6.0), [[-scale, 0.0], [0.0, scale]]).unwrap()
    }

    #[test]
    fn reference_pixel_maps_to_reference_coord() {
        let wcs = tess_like();
        let (x, y) = wcs.world_to_pixel(120.0, -30.0).unwrap();
        assert_relative_eq!(x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn round_trip_within_stamp() {
        let wcs = tess_like();
        for (px, py) in [(0.0, 0.0), (3.2, 7.9), (10.0, 10.0)] {
            let (ra, dec) = wcs.pixel_to_world(px, py);
            let (x, y) = wcs.world_to_pixel(ra, dec).unwrap();
            assert_relative_eq!(x, px, epsilon = 1e-6);
            assert_relative_eq!(y, py, epsilon = 1e-6);
        }
    }

    #[test]
    fn dec_offset_moves_along_rows() {
        let wcs = tess_like();
        // +21 arcsec in dec is one pixel row up.
        let (x, y) = wcs.world_to_pixel(120.0, -30.0 + 21.0 / 3600.0).unwrap();
        assert_relative_eq!(x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(y, 6.0, epsilon = 1e-4);
    }

    #[test]
    fn far_hemisphere_is_rejected() {
        let wcs = tess_like();
        assert!(wcs.world_to_pixel(300.0, 30.0).is_none());
    }

    #[test]
    fn pixel_scale_from_cd() {
        let wcs = tess_like();
        assert_relative_eq!(wcs.pixel_scale_arcsec(), 21.0, epsilon = 1e-9);
    }

    #[test]
    fn singular_cd_is_rejected() {
        let result = TanWcs::new((0.0, 0.0), (1.0, 1.0), [[1.0, 1.0], [1.0, 1.0]]);
        assert!(result.is_err());
    }
}
