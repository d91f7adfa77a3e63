use super::{DetectError, DetectionConfig, DetectionReport, StageCursor};
use crate::background::remove_background;
use crate::features::extract_centers;
use crate::label::label_components;
use crate::median::median_filter;
use crate::threshold::binarize;
use nvision_core::{AllocError, Grid};
use std::borrow::Cow;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// NV-center detector with a validated configuration.
///
/// Detection is pure and re-entrant: one detector can serve any number of
/// scans, from any number of threads.
#[derive(Clone, Debug)]
pub struct NvDetector {
    config: DetectionConfig,
}

impl NvDetector {
    /// Validate `config` and build a detector from it.
    pub fn new(config: DetectionConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Detector configuration.
    #[inline]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Apply the enabled preprocessing stages to `grid`.
    ///
    /// With both stages disabled the input is returned borrowed.
    pub fn preprocess<'a>(&self, grid: &'a Grid) -> Result<Cow<'a, Grid>, AllocError> {
        let mut processed = Cow::Borrowed(grid);
        if self.config.median_filter && self.config.filter_size > 1 {
            processed = Cow::Owned(median_filter(&processed, self.config.filter_size)?);
        }
        if self.config.background_correction {
            processed = Cow::Owned(remove_background(&processed, self.config.background_sigma)?);
        }
        Ok(processed)
    }

    /// Run the full pipeline on `grid`.
    ///
    /// Returns a report with zero centers when nothing survives the gates.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, grid), fields(width = grid.width(), height = grid.height()))
    )]
    pub fn detect(&self, grid: &Grid) -> Result<DetectionReport, DetectError> {
        let mut stages = StageCursor::new();
        let result = self.run(grid, &mut stages);
        if let Err(err) = &result {
            stages.fail(err);
        }
        result
    }

    /// Build a grid from nested rows and run the pipeline on it.
    pub fn detect_rows(&self, rows: Vec<Vec<f64>>) -> Result<DetectionReport, DetectError> {
        let grid = Grid::from_rows(rows)?;
        self.detect(&grid)
    }

    fn run(&self, grid: &Grid, stages: &mut StageCursor) -> Result<DetectionReport, DetectError> {
        let cfg = &self.config;

        stages.advance();
        let processed = self.preprocess(grid).map_err(|e| stages.exhausted(e))?;

        stages.advance();
        let mask = binarize(&processed, cfg.threshold).map_err(|e| stages.exhausted(e))?;

        stages.advance();
        let regions = label_components(&mask, cfg.connectivity)
            .and_then(|labeling| labeling.regions())
            .map_err(|e| stages.exhausted(e))?;

        stages.advance();
        let centers = extract_centers(&regions, &processed, &cfg.gates());
        log::debug!(
            "{} of {} regions accepted as centers",
            centers.len(),
            regions.len()
        );

        stages.advance();
        Ok(DetectionReport::new(centers, cfg.clone(), mask))
    }
}

/// Validate `config` and run the pipeline on `grid`.
pub fn detect(grid: &Grid, config: &DetectionConfig) -> Result<DetectionReport, DetectError> {
    NvDetector::new(config.clone())?.detect(grid)
}
