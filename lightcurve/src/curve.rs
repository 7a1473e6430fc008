//! Magnitude light curve container and phase folding.

use std::collections::BTreeMap;

use crate::time::{Epoch, TimeFormat};
use crate::{LightCurveError, Result};

/// Metadata key for the source file URL.
pub const META_FILE_URL: &str = "FILEURL";
/// Metadata key for the object designation.
pub const META_OBJECT: &str = "OBJECT";
/// Metadata key naming the column the magnitudes came from.
pub const META_FLUX_ORIGIN: &str = "FLUX_ORIGIN";
/// Metadata key naming the column the times came from.
pub const META_TIME_ORIGIN: &str = "TIME_ORIGIN";

/// One photometric measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Time as a plain Julian Date.
    pub time_jd: f64,
    /// Brightness in magnitudes.
    pub mag: f64,
    /// Magnitude uncertainty.
    pub mag_err: f64,
    /// Instrument filter code (e.g. ZTF `zg` / `zr`), when known.
    pub filter: Option<String>,
}

/// A time-sorted series of magnitude measurements.
#[derive(Debug, Clone)]
pub struct LightCurve {
    samples: Vec<Sample>,
    /// The format the times were read in, used for axis labelling.
    pub time_format: TimeFormat,
    /// Short label for plot titles.
    pub label: String,
    /// Free-form provenance metadata.
    pub meta: BTreeMap<String, String>,
}

impl LightCurve {
    /// Build a curve from samples; they are sorted by time on construction.
    pub fn new(mut samples: Vec<Sample>, time_format: TimeFormat) -> Self {
        samples.sort_by(|a, b| a.time_jd.total_cmp(&b.time_jd));
        Self {
            samples,
            time_format,
            label: String::new(),
            meta: BTreeMap::new(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample time in the curve's native display format.
    pub fn display_time(&self, sample: &Sample) -> f64 {
        self.time_format.from_jd(sample.time_jd)
    }

    /// (min, max) of the finite magnitudes, or None for an empty curve.
    pub fn mag_range(&self) -> Option<(f64, f64)> {
        let mut it = self.samples.iter().map(|s| s.mag).filter(|m| m.is_finite());
        let first = it.next()?;
        let (mut lo, mut hi) = (first, first);
        for m in it {
            lo = lo.min(m);
            hi = hi.max(m);
        }
        Some((lo, hi))
    }

    /// Distinct filter codes present, sorted.
    pub fn filters(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .samples
            .iter()
            .filter_map(|s| s.filter.clone())
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }

    /// Fold at `period_days` about `epoch` (first sample time when absent).
    ///
    /// Phases are normalized to `[-0.5, 0.5)`. Each folded sample keeps its
    /// original time so a phase plot can color points chronologically.
    pub fn fold(&self, period_days: f64, epoch: Option<Epoch>) -> Result<FoldedLightCurve> {
        if !(period_days > 0.0) {
            return Err(LightCurveError::NonPositivePeriod(period_days));
        }
        let epoch_jd = match epoch {
            Some(e) => e.jd(),
            None => self.samples.first().map(|s| s.time_jd).unwrap_or(0.0),
        };

        let mut folded: Vec<FoldedSample> = self
            .samples
            .iter()
            .map(|s| {
                let cycles = (s.time_jd - epoch_jd) / period_days;
                let phase = (cycles + 0.5).rem_euclid(1.0) - 0.5;
                FoldedSample {
                    phase,
                    mag: s.mag,
                    mag_err: s.mag_err,
                    time_original: self.time_format.from_jd(s.time_jd),
                }
            })
            .collect();
        folded.sort_by(|a, b| a.phase.total_cmp(&b.phase));

        Ok(FoldedLightCurve {
            samples: folded,
            period_days,
            epoch_jd,
            label: self.label.clone(),
        })
    }
}

/// One measurement of a folded curve.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedSample {
    /// Normalized phase in `[-0.5, 0.5)`.
    pub phase: f64,
    pub mag: f64,
    pub mag_err: f64,
    /// Unfolded time in the parent curve's display format.
    pub time_original: f64,
}

/// A light curve folded at a fixed period, sorted by phase.
#[derive(Debug, Clone)]
pub struct FoldedLightCurve {
    samples: Vec<FoldedSample>,
    pub period_days: f64,
    pub epoch_jd: f64,
    pub label: String,
}

impl FoldedLightCurve {
    pub fn samples(&self) -> &[FoldedSample] {
        &self.samples
    }

    /// (min, max) of the finite magnitudes, or None for an empty curve.
    pub fn mag_range(&self) -> Option<(f64, f64)> {
        let mut it = self.samples.iter().map(|s| s.mag).filter(|m| m.is_finite());
        let first = it.next()?;
        let (mut lo, mut hi) = (first, first);
        for m in it {
            lo = lo.min(m);
            hi = hi.max(m);
        }
        Some((lo, hi))
    }

    /// (min, max) of the original (unfolded) times.
    pub fn time_original_range(&self) -> Option<(f64, f64)> {
        let mut it = self.samples.iter().map(|s| s.time_original);
        let first = it.next()?;
        let (lo, hi) = it.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some((lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(t: f64, mag: f64) -> Sample {
        Sample {
            time_jd: t,
            mag,
            mag_err: 0.01,
            filter: None,
        }
    }

    #[test]
    fn construction_sorts_by_time() {
        let lc = LightCurve::new(
            vec![sample(3.0, 12.0), sample(1.0, 12.1), sample(2.0, 12.2)],
            TimeFormat::Jd,
        );
        let times: Vec<f64> = lc.samples().iter().map(|s| s.time_jd).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mag_range_skips_nan() {
        let lc = LightCurve::new(
            vec![sample(1.0, 12.0), sample(2.0, f64::NAN), sample(3.0, 13.5)],
            TimeFormat::Jd,
        );
        let (lo, hi) = lc.mag_range().unwrap();
        assert_relative_eq!(lo, 12.0);
        assert_relative_eq!(hi, 13.5);
    }

    #[test]
    fn filters_are_deduplicated() {
        let mut s1 = sample(1.0, 12.0);
        s1.filter = Some("zr".to_string());
        let mut s2 = sample(2.0, 12.0);
        s2.filter = Some("zg".to_string());
        let mut s3 = sample(3.0, 12.0);
        s3.filter = Some("zr".to_string());
        let lc = LightCurve::new(vec![s1, s2, s3], TimeFormat::Jd);
        assert_eq!(lc.filters(), vec!["zg".to_string(), "zr".to_string()]);
    }

    #[test]
    fn fold_normalizes_phase() {
        // Period 2 d, epoch at t=0: t=0.5 is phase 0.25, t=1.5 is phase -0.25.
        let lc = LightCurve::new(vec![sample(0.5, 12.0), sample(1.5, 12.5)], TimeFormat::Jd);
        let folded = lc
            .fold(2.0, Some(Epoch::new(0.0, TimeFormat::Jd)))
            .unwrap();
        let phases: Vec<f64> = folded.samples().iter().map(|s| s.phase).collect();
        assert_relative_eq!(phases[0], -0.25);
        assert_relative_eq!(phases[1], 0.25);
    }

    #[test]
    fn fold_epoch_at_sample_gives_zero_phase() {
        let lc = LightCurve::new(vec![sample(10.0, 12.0), sample(11.0, 12.5)], TimeFormat::Jd);
        let folded = lc
            .fold(1.0, Some(Epoch::new(10.0, TimeFormat::Jd)))
            .unwrap();
        for s in folded.samples() {
            assert_relative_eq!(s.phase, 0.0);
        }
    }

    #[test]
    fn fold_defaults_epoch_to_first_sample() {
        let lc = LightCurve::new(vec![sample(5.0, 12.0), sample(5.5, 12.5)], TimeFormat::Jd);
        let folded = lc.fold(1.0, None).unwrap();
        assert_relative_eq!(folded.epoch_jd, 5.0);
    }

    #[test]
    fn fold_rejects_non_positive_period() {
        let lc = LightCurve::new(vec![sample(1.0, 12.0)], TimeFormat::Jd);
        assert!(lc.fold(0.0, None).is_err());
        assert!(lc.fold(-1.5, None).is_err());
    }

    #[test]
    fn folded_samples_keep_original_time() {
        let lc = LightCurve::new(vec![sample(2_458_816.5, 12.0)], TimeFormat::Jd);
        let folded = lc.fold(1.0, None).unwrap();
        assert_relative_eq!(folded.samples()[0].time_original, 2_458_816.5);
    }
}
