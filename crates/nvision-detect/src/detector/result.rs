use super::DetectionConfig;
use crate::features::DetectedCenter;
use nvision_core::Mask;
use serde::{Deserialize, Serialize};

/// Output of a detection run.
///
/// Serializes with the report keys `centers`, `total`, `params` and
/// `binary_image`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub centers: Vec<DetectedCenter>,
    /// Always `centers.len()`.
    pub total: usize,
    /// Configuration the run used.
    #[serde(rename = "params")]
    pub config: DetectionConfig,
    /// Thresholded processed scan.
    #[serde(rename = "binary_image")]
    pub mask: Mask,
}

impl DetectionReport {
    pub fn new(centers: Vec<DetectedCenter>, config: DetectionConfig, mask: Mask) -> Self {
        Self {
            total: centers.len(),
            centers,
            config,
            mask,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Center with the given id, if any.
    pub fn center(&self, id: usize) -> Option<&DetectedCenter> {
        self.centers.iter().find(|c| c.id == id)
    }
}
