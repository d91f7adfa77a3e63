//! High-level facade for the `nvision-*` workspace.
//!
//! This crate re-exports the detection pipeline and its core types so that
//! applications depend on a single crate, and ships the `nvision` command-line
//! tool (feature `cli`, on by default).
//!
//! ## Quickstart
//!
//! ```no_run
//! use nvision::{load_scan, DetectionConfig, NvDetector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let grid = load_scan("scan.json")?;
//! let detector = NvDetector::new(DetectionConfig::default())?;
//! let report = detector.detect(&grid)?;
//! println!("found {} NV centers", report.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `nvision::core`: intensity grids, masks, fallible allocation, logging.
//! - `nvision::detection`: the pipeline stages, report I/O, summaries, synthetic
//!   scans and batch detection.
//!
//! The library never installs a logger. Binaries call [`init_with_level`], or
//! `init_tracing` with the `tracing` feature.

pub use nvision_core as core;
pub use nvision_detect as detection;

pub use nvision_core::{init_with_level, Grid, InputError, Mask};
pub use nvision_detect::{
    detect, detect_batch, load_scan, parse_scan, write_scan, ConfigError, Connectivity,
    DetectError, DetectedCenter, DetectionConfig, DetectionReport, DetectionSummary,
    IntensityHistogram, IoError, NvDetector, PipelineState, RunConfig, SyntheticScanParams,
};

#[cfg(feature = "tracing")]
pub use nvision_core::init_tracing;
