//! Per-region measurements and the size/confidence gates.

use crate::label::Region;
use nvision_core::Grid;
use serde::{Deserialize, Serialize};

/// One accepted NV-center candidate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedCenter {
    /// Sequential id, starting at 1, in label order.
    pub id: usize,
    /// Centroid column (sub-pixel).
    pub x: f64,
    /// Centroid row (sub-pixel).
    pub y: f64,
    /// Pixel count.
    pub size: usize,
    /// Mean processed intensity over the region.
    pub intensity: f64,
    /// `intensity / max(processed)`.
    pub confidence: f64,
}

/// Measurements of a single region before gating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionFeatures {
    pub size: usize,
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
    pub confidence: f64,
}

/// Acceptance gates applied to measured regions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CenterGates {
    /// Inclusive lower size bound.
    pub min_size: usize,
    /// Inclusive upper size bound.
    pub max_size: usize,
    pub confidence_threshold: f64,
}

impl CenterGates {
    /// Size gate first, confidence gate second.
    pub fn accepts(&self, features: &RegionFeatures) -> bool {
        if features.size < self.min_size || features.size > self.max_size {
            return false;
        }
        features.confidence >= self.confidence_threshold
    }
}

/// Measure `region` over the processed grid whose maximum is `grid_max`.
///
/// Confidence is reported as `0.0` when `grid_max` is not positive.
pub fn measure_region(region: &Region, processed: &Grid, grid_max: f64) -> RegionFeatures {
    let size = region.size();
    let (x, y) = region.centroid();
    let w = processed.width();
    let values = processed.as_slice();
    let sum: f64 = region.pixels.iter().map(|p| values[p.y * w + p.x]).sum();
    let intensity = sum / size as f64;
    let confidence = if grid_max > 0.0 {
        intensity / grid_max
    } else {
        0.0
    };
    RegionFeatures {
        size,
        x,
        y,
        intensity,
        confidence,
    }
}

/// Measure and gate `regions`, numbering survivors from 1 in region order.
pub fn extract_centers(
    regions: &[Region],
    processed: &Grid,
    gates: &CenterGates,
) -> Vec<DetectedCenter> {
    let grid_max = processed.max();
    let mut centers = Vec::new();
    for region in regions {
        let f = measure_region(region, processed, grid_max);
        if !gates.accepts(&f) {
            log::trace!(
                "region {} rejected: size={} confidence={:.3}",
                region.label,
                f.size,
                f.confidence
            );
            continue;
        }
        centers.push(DetectedCenter {
            id: centers.len() + 1,
            x: f.x,
            y: f.y,
            size: f.size,
            intensity: f.intensity,
            confidence: f.confidence,
        });
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{label_components, Connectivity};
    use crate::threshold::binarize;
    use approx::assert_relative_eq;

    fn regions_of(grid: &Grid) -> Vec<Region> {
        let mask = binarize(grid, 0.0).expect("alloc");
        label_components(&mask, Connectivity::Four)
            .expect("alloc")
            .regions()
            .expect("alloc")
    }

    fn open_gates() -> CenterGates {
        CenterGates {
            min_size: 1,
            max_size: 100,
            confidence_threshold: 0.0,
        }
    }

    #[test]
    fn measures_mean_intensity_and_confidence() {
        let grid = Grid::from_rows(vec![
            vec![0.0, 0.0, 0.0, 0.0],
            vec![0.0, 2.0, 4.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.0],
        ])
        .expect("grid");
        let regions = regions_of(&grid);
        let f = measure_region(&regions[0], &grid, grid.max());
        assert_eq!(f.size, 2);
        assert_relative_eq!(f.x, 1.5);
        assert_relative_eq!(f.y, 1.0);
        assert_relative_eq!(f.intensity, 3.0);
        assert_relative_eq!(f.confidence, 0.75);
    }

    #[test]
    fn size_gate_runs_before_confidence_gate() {
        let gates = CenterGates {
            min_size: 2,
            max_size: 4,
            confidence_threshold: 0.5,
        };
        let bright_small = RegionFeatures {
            size: 1,
            x: 0.0,
            y: 0.0,
            intensity: 1.0,
            confidence: 1.0,
        };
        let dim_ok = RegionFeatures {
            size: 3,
            confidence: 0.49,
            ..bright_small
        };
        let ok = RegionFeatures {
            size: 4,
            confidence: 0.5,
            ..bright_small
        };
        assert!(!gates.accepts(&bright_small));
        assert!(!gates.accepts(&dim_ok));
        assert!(gates.accepts(&ok));
    }

    #[test]
    fn ids_are_sequential_over_survivors() {
        let grid = Grid::from_rows(vec![
            vec![1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        ])
        .expect("grid");
        let regions = regions_of(&grid);
        assert_eq!(regions.len(), 3);
        let gates = CenterGates {
            min_size: 2,
            ..open_gates()
        };
        let centers = extract_centers(&regions, &grid, &gates);
        assert_eq!(centers.len(), 2);
        assert_eq!(centers[0].id, 1);
        assert_relative_eq!(centers[0].x, 2.5);
        assert_eq!(centers[1].id, 2);
        assert_relative_eq!(centers[1].x, 5.0);
        assert_relative_eq!(centers[1].y, 0.5);
    }

    #[test]
    fn non_positive_maximum_gives_zero_confidence() {
        let grid = Grid::filled(2, 2, -1.0).expect("grid");
        let region = Region {
            label: 1,
            pixels: vec![crate::label::Pixel { x: 0, y: 0 }],
        };
        let f = measure_region(&region, &grid, grid.max());
        assert_eq!(f.confidence, 0.0);
    }
}
