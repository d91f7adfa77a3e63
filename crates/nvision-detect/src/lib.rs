//! NV-center detection in confocal scan grids.
//!
//! The pipeline runs, in order:
//! - optional median filtering against hot pixels,
//! - optional Gaussian background removal,
//! - relative thresholding against the processed maximum,
//! - connected-component labeling,
//! - per-region measurement with size and confidence gates.
//!
//! [`NvDetector`] validates a [`DetectionConfig`] once and can then be reused
//! across scans and threads. Scan and report files, CSV export, summary
//! statistics, a synthetic scan generator and batch detection are built on
//! top of it.

pub mod background;
mod batch;
mod detector;
mod features;
mod io;
pub mod label;
pub mod median;
mod summary;
pub mod synthetic;
pub mod threshold;

pub use batch::{detect_batch, BatchResult};
pub use detector::{
    detect, ConfigError, DetectError, DetectionConfig, DetectionReport, NvDetector,
    PipelineState,
};
pub use features::{extract_centers, measure_region, CenterGates, DetectedCenter, RegionFeatures};
pub use io::{
    grid_from_scan_value, load_scan, parse_scan, read_centers_csv, read_scan,
    write_centers_csv, write_scan, IoError, RunConfig, ScanFile, CSV_HEADER,
};
pub use label::{label_components, Connectivity, Labeling, Pixel, PixelBox, Region};
pub use summary::{DetectionSummary, IntensityHistogram, HISTOGRAM_BINS};
pub use synthetic::{SyntheticError, SyntheticScan, SyntheticScanParams, SyntheticSpot};

pub use nvision_core::{Grid, InputError, Mask};
