use crate::features::CenterGates;
use crate::label::Connectivity;
use serde::{Deserialize, Serialize};

/// Configuration rejected before the pipeline starts.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("min_size must be at least 1")]
    ZeroMinSize,
    #[error("min_size ({min_size}) must be smaller than max_size ({max_size})")]
    SizeRange { min_size: usize, max_size: usize },
    #[error("filter_size must be a positive odd integer, got {0}")]
    FilterSize(usize),
    #[error("background_sigma must be positive and finite, got {0}")]
    BackgroundSigma(f64),
}

/// Parameters of one detection run.
///
/// Missing keys in JSON fall back to [`DetectionConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Binarization cut as a fraction of the processed grid's maximum.
    pub threshold: f64,
    /// Smallest accepted region, in pixels (inclusive).
    pub min_size: usize,
    /// Largest accepted region, in pixels (inclusive).
    pub max_size: usize,
    /// Estimate and subtract a smooth background before thresholding.
    pub background_correction: bool,
    /// Minimum `intensity / max` score of an accepted region.
    pub confidence_threshold: f64,
    /// Median-filter the scan before background correction.
    pub median_filter: bool,
    /// Median window side length (odd).
    pub filter_size: usize,
    /// Gaussian scale of the background estimate, in pixels.
    pub background_sigma: f64,
    /// Adjacency rule for connected-component labeling.
    pub connectivity: Connectivity,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            min_size: 3,
            max_size: 15,
            background_correction: true,
            confidence_threshold: 0.8,
            median_filter: true,
            filter_size: 3,
            background_sigma: 10.0,
            connectivity: Connectivity::Four,
        }
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfUnitRange { name, value })
    }
}

impl DetectionConfig {
    /// Check every field; the first violation is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_range("threshold", self.threshold)?;
        unit_range("confidence_threshold", self.confidence_threshold)?;
        if self.min_size == 0 {
            return Err(ConfigError::ZeroMinSize);
        }
        if self.min_size >= self.max_size {
            return Err(ConfigError::SizeRange {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        if self.filter_size % 2 == 0 {
            return Err(ConfigError::FilterSize(self.filter_size));
        }
        if !(self.background_sigma.is_finite() && self.background_sigma > 0.0) {
            return Err(ConfigError::BackgroundSigma(self.background_sigma));
        }
        Ok(())
    }

    /// Region acceptance gates derived from this configuration.
    pub fn gates(&self) -> CenterGates {
        CenterGates {
            min_size: self.min_size,
            max_size: self.max_size,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DetectionConfig::default().validate().expect("valid defaults");
    }

    #[test]
    fn rejects_each_invalid_field() {
        let base = DetectionConfig::default();
        let cases = [
            (
                DetectionConfig {
                    threshold: 1.5,
                    ..base.clone()
                },
                ConfigError::OutOfUnitRange {
                    name: "threshold",
                    value: 1.5,
                },
            ),
            (
                DetectionConfig {
                    confidence_threshold: -0.1,
                    ..base.clone()
                },
                ConfigError::OutOfUnitRange {
                    name: "confidence_threshold",
                    value: -0.1,
                },
            ),
            (
                DetectionConfig {
                    min_size: 0,
                    ..base.clone()
                },
                ConfigError::ZeroMinSize,
            ),
            (
                DetectionConfig {
                    min_size: 15,
                    max_size: 15,
                    ..base.clone()
                },
                ConfigError::SizeRange {
                    min_size: 15,
                    max_size: 15,
                },
            ),
            (
                DetectionConfig {
                    filter_size: 4,
                    ..base.clone()
                },
                ConfigError::FilterSize(4),
            ),
            (
                DetectionConfig {
                    filter_size: 0,
                    ..base.clone()
                },
                ConfigError::FilterSize(0),
            ),
            (
                DetectionConfig {
                    background_sigma: 0.0,
                    ..base.clone()
                },
                ConfigError::BackgroundSigma(0.0),
            ),
        ];
        for (cfg, expected) in cases {
            assert_eq!(cfg.validate(), Err(expected));
        }
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let cfg = DetectionConfig {
            threshold: f64::NAN,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfUnitRange {
                name: "threshold",
                ..
            })
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: DetectionConfig =
            serde_json::from_str(r#"{"threshold": 0.5, "connectivity": "eight"}"#)
                .expect("parse");
        assert_eq!(cfg.threshold, 0.5);
        assert_eq!(cfg.connectivity, Connectivity::Eight);
        assert_eq!(cfg.min_size, 3);
        assert_eq!(cfg.filter_size, 3);
        assert!(cfg.median_filter);
    }
}
