//! NV-center detection pipeline.
//!
//! This module wires together preprocessing (median filter and background
//! removal), relative thresholding, connected-component labeling and
//! per-region feature gating into a single [`NvDetector::detect`] call.

mod error;
mod params;
mod pipeline;
mod result;
mod state;

pub use error::DetectError;
pub use params::{ConfigError, DetectionConfig};
pub use pipeline::{detect, NvDetector};
pub use result::DetectionReport;
pub use state::PipelineState;

pub(crate) use state::StageCursor;
