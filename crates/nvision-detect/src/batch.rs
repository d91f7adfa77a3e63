//! Parallel detection over independent scans.

use crate::{detect, DetectError, DetectionConfig, DetectionReport, NvDetector};
use nvision_core::Grid;
use rayon::prelude::*;

/// Outcome of one scan in a batch.
pub type BatchResult = Result<DetectionReport, DetectError>;

/// Run every `(grid, config)` pair on the rayon pool.
///
/// Results come back in input order; one failing scan does not affect the
/// others.
pub fn detect_batch(jobs: &[(Grid, DetectionConfig)]) -> Vec<BatchResult> {
    log::debug!(
        "batch of {} scans on {} threads",
        jobs.len(),
        rayon::current_num_threads()
    );
    jobs.par_iter()
        .map(|(grid, config)| detect(grid, config))
        .collect()
}

impl NvDetector {
    /// Run this detector over `grids` in parallel, preserving order.
    pub fn detect_many(&self, grids: &[Grid]) -> Vec<BatchResult> {
        grids.par_iter().map(|grid| self.detect(grid)).collect()
    }
}
