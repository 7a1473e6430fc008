//! Target Pixel File cube reading.
//!
//! A TPF is a FITS file with a `PIXELS` binary table (per-cadence `TIME`,
//! `FLUX` stamp and `QUALITY` flags) and an `APERTURE` image holding the
//! pipeline aperture bitmask and the WCS cards. TessCut cutouts share the
//! layout and are recognized by their `CREATOR = astrocut` header.

use std::path::Path;

use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::{FitsHdu, HduInfo};
use fitsio::compat::images::ReadImage;
use ndarray::{Array2, Array3};
use tracing::debug;

use crate::wcs::TanWcs;
use crate::{Result, TpfError};

/// Julian Date of the J2000.0 epoch.
const J2000_JD: f64 = 2_451_545.0;

/// JD = BTJD + this offset.
pub const BTJD_OFFSET: f64 = 2_457_000.0;

/// Pixel brightness at the start of a sector is often dominated by scattered
/// light; the display frame skips this many days when the baseline allows.
const TRUNCATE_LEADING_DAYS: f64 = 3.0;

/// Aperture bitmask bit flagging pixels in the pipeline optimal aperture.
const APERTURE_PIPELINE_BIT: i64 = 2;

/// Header metadata of a pixel file.
#[derive(Debug, Clone, Default)]
pub struct TpfMeta {
    pub object: Option<String>,
    pub sector: Option<i64>,
    pub camera: Option<i64>,
    pub ccd: Option<i64>,
    /// TESS magnitude of the target; TessCut writes an explicit 0.
    pub tess_mag: Option<f64>,
    pub creator: Option<String>,
}

/// An in-memory Target Pixel File.
#[derive(Debug, Clone)]
pub struct TargetPixelFile {
    pub meta: TpfMeta,
    /// Cadence midtimes, BTJD.
    pub time_btjd: Vec<f64>,
    /// Flux cube, `[cadence, row, column]`, e/s.
    pub flux: Array3<f64>,
    /// Per-cadence quality flags; zero means good.
    pub quality: Vec<i32>,
    /// Aperture bitmask image, `[row, column]`.
    pub aperture: Array2<i64>,
    /// Stamp WCS, when the cards are present.
    pub wcs: Option<TanWcs>,
}

fn key_f64(fits: &mut FitsFile, hdu: &FitsHdu, name: &str) -> Option<f64> {
    hdu.read_key::<f64>(fits, name).ok()
}

fn key_i64(fits: &mut FitsFile, hdu: &FitsHdu, name: &str) -> Option<i64> {
    hdu.read_key::<i64>(fits, name).ok()
}

fn key_string(fits: &mut FitsFile, hdu: &FitsHdu, name: &str) -> Option<String> {
    hdu.read_key::<String>(fits, name)
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_wcs(fits: &mut FitsFile, hdu: &FitsHdu) -> Option<TanWcs> {
    let crval1 = key_f64(fits, hdu, "CRVAL1")?;
    let crval2 = key_f64(fits, hdu, "CRVAL2")?;
    let crpix1 = key_f64(fits, hdu, "CRPIX1")?;
    let crpix2 = key_f64(fits, hdu, "CRPIX2")?;
    let cd = match (
        key_f64(fits, hdu, "CD1_1"),
        key_f64(fits, hdu, "CD1_2"),
        key_f64(fits, hdu, "CD2_1"),
        key_f64(fits, hdu, "CD2_2"),
    ) {
        (Some(cd11), cd12, cd21, Some(cd22)) => [
            [cd11, cd12.unwrap_or(0.0)],
            [cd21.unwrap_or(0.0), cd22],
        ],
        _ => {
            // Fall back to CDELT for cutouts written without a CD matrix.
            let cdelt1 = key_f64(fits, hdu, "CDELT1")?;
            let cdelt2 = key_f64(fits, hdu, "CDELT2")?;
            [[cdelt1, 0.0], [0.0, cdelt2]]
        }
    };
    TanWcs::new((crval1, crval2), (crpix1, crpix2), cd).ok()
}

impl TargetPixelFile {
    /// Read a pixel file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening pixel file");
        let mut fits = FitsFile::open(path)?;

        let primary = fits.primary_hdu()?;
        let meta = TpfMeta {
            object: key_string(&mut fits, &primary, "OBJECT"),
            sector: key_i64(&mut fits, &primary, "SECTOR"),
            camera: key_i64(&mut fits, &primary, "CAMERA"),
            ccd: key_i64(&mut fits, &primary, "CCD"),
            tess_mag: key_f64(&mut fits, &primary, "TESSMAG"),
            creator: key_string(&mut fits, &primary, "CREATOR"),
        };

        let pixels = fits.hdu("PIXELS").or_else(|_| fits.hdu(1))?;
        let time_btjd: Vec<f64> = pixels.read_col(&mut fits, "TIME")?;
        let flux_flat: Vec<f64> = pixels.read_col(&mut fits, "FLUX")?;
        let quality: Vec<i32> = pixels.read_col(&mut fits, "QUALITY")?;

        let aperture_hdu = fits.hdu("APERTURE").or_else(|_| fits.hdu(2))?;
        let (rows, cols) = match aperture_hdu.info(&fits)? {
            HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
            _ => {
                return Err(TpfError::Malformed(
                    "APERTURE extension is not a 2-D image".to_string(),
                ))
            }
        };
        let aperture_flat: Vec<i64> = i64::read_image(&fits, &aperture_hdu)?;
        let aperture = Array2::from_shape_vec((rows, cols), aperture_flat)
            .map_err(|e| TpfError::Malformed(format!("aperture shape: {e}")))?;

        let n_cadences = time_btjd.len();
        if n_cadences == 0 || flux_flat.len() != n_cadences * rows * cols {
            return Err(TpfError::Malformed(format!(
                "flux cube size {} does not match {n_cadences} cadences of {rows}x{cols} pixels",
                flux_flat.len()
            )));
        }
        let flux = Array3::from_shape_vec((n_cadences, rows, cols), flux_flat)
            .map_err(|e| TpfError::Malformed(format!("flux shape: {e}")))?;

        let wcs = read_wcs(&mut fits, &aperture_hdu);

        Ok(Self {
            meta,
            time_btjd,
            flux,
            quality,
            aperture,
            wcs,
        })
    }

    /// Stamp size as (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.aperture.nrows(), self.aperture.ncols())
    }

    /// Whether this cube came from the TessCut cutout service.
    pub fn is_tesscut(&self) -> bool {
        self.meta.creator.as_deref() == Some("astrocut")
    }

    /// Pipeline optimal-aperture mask (bit 2 of the aperture image).
    pub fn pipeline_mask(&self) -> Array2<bool> {
        self.aperture.map(|&v| v & APERTURE_PIPELINE_BIT != 0)
    }

    /// Observation epoch as a Julian year, from the midpoint of the cadence
    /// times. Used to proper-motion correct catalog positions.
    pub fn epoch_jyear(&self) -> f64 {
        let finite: Vec<f64> = self
            .time_btjd
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .collect();
        let mid_btjd = match (
            finite.iter().cloned().reduce(f64::min),
            finite.iter().cloned().reduce(f64::max),
        ) {
            (Some(lo), Some(hi)) => (lo + hi) / 2.0,
            _ => 0.0,
        };
        2000.0 + (mid_btjd + BTJD_OFFSET - J2000_JD) / 365.25
    }

    /// Per-pixel median brightness of the good cadences.
    ///
    /// Skips the first days of the sector when the baseline exceeds
    /// [`TRUNCATE_LEADING_DAYS`], since early-sector frames are often
    /// dominated by scattered light, and ignores cadences with non-zero
    /// quality flags or non-finite times.
    pub fn display_frame(&self) -> Array2<f64> {
        let finite_times: Vec<f64> = self
            .time_btjd
            .iter()
            .copied()
            .filter(|t| t.is_finite())
            .collect();
        let t_min = finite_times.iter().cloned().reduce(f64::min);
        let t_max = finite_times.iter().cloned().reduce(f64::max);
        let cutoff = match (t_min, t_max) {
            (Some(lo), Some(hi)) if hi - lo > TRUNCATE_LEADING_DAYS => {
                Some(lo + TRUNCATE_LEADING_DAYS)
            }
            _ => None,
        };

        let keep: Vec<usize> = (0..self.time_btjd.len())
            .filter(|&i| {
                let t = self.time_btjd[i];
                t.is_finite()
                    && self.quality.get(i).copied().unwrap_or(0) == 0
                    && cutoff.map_or(true, |c| t > c)
            })
            .collect();

        let (rows, cols) = self.shape();
        let mut frame = Array2::from_elem((rows, cols), f64::NAN);
        let mut samples = Vec::with_capacity(keep.len());
        for r in 0..rows {
            for c in 0..cols {
                samples.clear();
                samples.extend(
                    keep.iter()
                        .map(|&i| self.flux[[i, r, c]])
                        .filter(|v| v.is_finite()),
                );
                if samples.is_empty() {
                    continue;
                }
                samples.sort_by(f64::total_cmp);
                let mid = samples.len() / 2;
                frame[[r, c]] = if samples.len() % 2 == 1 {
                    samples[mid]
                } else {
                    (samples[mid - 1] + samples[mid]) / 2.0
                };
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn toy_tpf(time_btjd: Vec<f64>, quality: Vec<i32>, flux_per_cadence: Vec<f64>) -> TargetPixelFile {
        let n = time_btjd.len();
        let mut flux = Array3::zeros((n, 2, 2));
        for (i, v) in flux_per_cadence.iter().enumerate() {
            flux.slice_mut(ndarray::s![i, .., ..]).fill(*v);
        }
        TargetPixelFile {
            meta: TpfMeta::default(),
            time_btjd,
            flux,
            quality,
            aperture: arr2(&[[3, 1], [1, 3]]),
            wcs: None,
        }
    }

    #[test]
    fn pipeline_mask_uses_bit_two() {
        let tpf = toy_tpf(vec![0.0], vec![0], vec![1.0]);
        let mask = tpf.pipeline_mask();
        assert!(mask[[0, 0]]);
        assert!(!mask[[0, 1]]);
        assert!(!mask[[1, 0]]);
        assert!(mask[[1, 1]]);
    }

    #[test]
    fn display_frame_truncates_leading_days() {
        // 10-day baseline; the first 3 days carry inflated flux.
        let times: Vec<f64> = (0..10).map(|d| 1000.0 + d as f64).collect();
        let flux: Vec<f64> = times
            .iter()
            .map(|t| if *t <= 1003.0 { 1000.0 } else { 10.0 })
            .collect();
        let tpf = toy_tpf(times, vec![0; 10], flux);
        let frame = tpf.display_frame();
        assert_relative_eq!(frame[[0, 0]], 10.0);
    }

    #[test]
    fn short_baseline_is_not_truncated() {
        let times = vec![1000.0, 1000.5, 1001.0];
        let tpf = toy_tpf(times, vec![0; 3], vec![5.0, 7.0, 9.0]);
        let frame = tpf.display_frame();
        assert_relative_eq!(frame[[1, 1]], 7.0);
    }

    #[test]
    fn bad_quality_cadences_are_ignored() {
        let times = vec![1000.0, 1000.5, 1001.0];
        let tpf = toy_tpf(times, vec![0, 8, 0], vec![5.0, 500.0, 9.0]);
        let frame = tpf.display_frame();
        assert_relative_eq!(frame[[0, 0]], 7.0);
    }

    #[test]
    fn tesscut_detection() {
        let mut tpf = toy_tpf(vec![1000.0], vec![0], vec![1.0]);
        assert!(!tpf.is_tesscut());
        tpf.meta.creator = Some("astrocut".to_string());
        assert!(tpf.is_tesscut());
    }

    #[test]
    fn epoch_jyear_from_midtime() {
        // BTJD 1544.5 is JD 2458544.5, about 2019.16.
        let tpf = toy_tpf(vec![1531.0, 1558.0], vec![0, 0], vec![1.0, 1.0]);
        let epoch = tpf.epoch_jyear();
        assert!(
            (epoch - 2019.16).abs() < 0.01,
            "epoch {epoch} not near 2019.16"
        );
    }
}
