//! Aggregate statistics over a detection report.

use crate::{DetectedCenter, DetectionReport};
use serde::{Deserialize, Serialize};

/// Default number of intensity histogram bins.
pub const HISTOGRAM_BINS: usize = 10;

/// Report-level statistics; averages are `0.0` for an empty report.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total: usize,
    pub average_size: f64,
    pub average_intensity: f64,
    pub average_confidence: f64,
    /// Centers per scanned pixel.
    pub density: f64,
}

impl DetectionSummary {
    pub fn from_report(report: &DetectionReport) -> Self {
        let pixels = report.mask.width() * report.mask.height();
        Self::from_centers(&report.centers, pixels)
    }

    /// Statistics over `centers` found in a scan of `pixels` cells.
    pub fn from_centers(centers: &[DetectedCenter], pixels: usize) -> Self {
        let total = centers.len();
        let mean = |f: fn(&DetectedCenter) -> f64| {
            if total == 0 {
                0.0
            } else {
                centers.iter().map(f).sum::<f64>() / total as f64
            }
        };
        Self {
            total,
            average_size: mean(|c| c.size as f64),
            average_intensity: mean(|c| c.intensity),
            average_confidence: mean(|c| c.confidence),
            density: if pixels == 0 {
                0.0
            } else {
                total as f64 / pixels as f64
            },
        }
    }
}

/// Equal-width histogram of center intensities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntensityHistogram {
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl IntensityHistogram {
    /// Bin the intensities of `centers` into `bins` equal-width bins.
    ///
    /// The range spans the observed minimum and maximum, widened by 0.5 on
    /// each side when they coincide, and `[0, 1]` when there is no data. The
    /// last bin is closed on the right.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    pub fn from_centers(centers: &[DetectedCenter], bins: usize) -> Self {
        assert!(bins > 0, "histogram needs at least one bin");
        let (mut lo, mut hi) = centers
            .iter()
            .map(|c| c.intensity)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if centers.is_empty() {
            (lo, hi) = (0.0, 1.0);
        } else if lo == hi {
            (lo, hi) = (lo - 0.5, hi + 0.5);
        }

        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for c in centers {
            let bin = (((c.intensity - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Self { edges, counts }
    }

    pub fn from_report(report: &DetectionReport) -> Self {
        Self::from_centers(&report.centers, HISTOGRAM_BINS)
    }

    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn center(id: usize, size: usize, intensity: f64, confidence: f64) -> DetectedCenter {
        DetectedCenter {
            id,
            x: 0.0,
            y: 0.0,
            size,
            intensity,
            confidence,
        }
    }

    #[test]
    fn summary_averages_and_density() {
        let centers = [center(1, 4, 0.5, 0.6), center(2, 8, 1.0, 1.0)];
        let s = DetectionSummary::from_centers(&centers, 100);
        assert_eq!(s.total, 2);
        assert_relative_eq!(s.average_size, 6.0);
        assert_relative_eq!(s.average_intensity, 0.75);
        assert_relative_eq!(s.average_confidence, 0.8);
        assert_relative_eq!(s.density, 0.02);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        let s = DetectionSummary::from_centers(&[], 25);
        assert_eq!(s.total, 0);
        assert_eq!(s.average_size, 0.0);
        assert_eq!(s.density, 0.0);
    }

    #[test]
    fn histogram_closes_last_bin() {
        let centers: Vec<_> = [0.0, 0.05, 0.55, 0.95, 1.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| center(i + 1, 3, v, 1.0))
            .collect();
        let h = IntensityHistogram::from_centers(&centers, 10);
        assert_eq!(h.bins(), 10);
        assert_eq!(h.edges.len(), 11);
        assert_relative_eq!(h.edges[0], 0.0);
        assert_relative_eq!(h.edges[10], 1.0);
        assert_eq!(h.counts, vec![2, 0, 0, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(h.counts.iter().sum::<usize>(), centers.len());
    }

    #[test]
    fn degenerate_range_is_widened() {
        let centers = [center(1, 3, 2.0, 1.0), center(2, 3, 2.0, 1.0)];
        let h = IntensityHistogram::from_centers(&centers, 10);
        assert_relative_eq!(h.edges[0], 1.5);
        assert_relative_eq!(h.edges[10], 2.5);
        assert_eq!(h.counts[5], 2);
    }

    #[test]
    fn empty_histogram_spans_unit_range() {
        let h = IntensityHistogram::from_centers(&[], 4);
        assert_eq!(h.counts, vec![0; 4]);
        assert_relative_eq!(h.edges[4], 1.0);
    }
}
