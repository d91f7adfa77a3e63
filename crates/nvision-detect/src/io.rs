//! JSON scan/report files, CSV export and run configuration.

use crate::{DetectError, DetectedCenter, DetectionConfig, DetectionReport, NvDetector};
use nvision_core::{Grid, InputError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fmt, fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("CSV row {row}: {message}")]
    CsvField { row: usize, message: String },
}

impl From<InputError> for IoError {
    fn from(err: InputError) -> Self {
        IoError::Detect(DetectError::InvalidInput(err))
    }
}

/// Column names of the center CSV export.
pub const CSV_HEADER: [&str; 6] = ["id", "x", "y", "size", "intensity", "confidence"];

/// Scan file layout: `{ "scan_data": [[f64, ...], ...] }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanFile {
    pub scan_data: Grid,
}

/// Build a grid from a parsed scan document, reporting the first defect found.
pub fn grid_from_scan_value(value: &Value) -> Result<Grid, InputError> {
    let scan = value
        .get("scan_data")
        .ok_or(InputError::MissingScanData)?;
    let rows = scan.as_array().ok_or(InputError::NotAnArray)?;

    let mut grid_rows = Vec::with_capacity(rows.len());
    for (y, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or(InputError::RowNotAnArray { row: y })?;
        let values = cells
            .iter()
            .enumerate()
            .map(|(x, cell)| cell.as_f64().ok_or(InputError::NonNumeric { x, y }))
            .collect::<Result<Vec<f64>, _>>()?;
        grid_rows.push(values);
    }
    Grid::from_rows(grid_rows)
}

/// Parse a scan document from a JSON string.
pub fn parse_scan(json: &str) -> Result<Grid, IoError> {
    let value: Value = serde_json::from_str(json)?;
    Ok(grid_from_scan_value(&value)?)
}

/// Parse a scan document from a reader.
pub fn read_scan(reader: impl Read) -> Result<Grid, IoError> {
    let value: Value = serde_json::from_reader(reader)?;
    Ok(grid_from_scan_value(&value)?)
}

/// Load a scan document from disk.
pub fn load_scan(path: impl AsRef<Path>) -> Result<Grid, IoError> {
    let raw = fs::read_to_string(path)?;
    parse_scan(&raw)
}

/// Write `grid` to disk as a scan document.
pub fn write_scan(grid: &Grid, path: impl AsRef<Path>) -> Result<(), IoError> {
    let file = ScanFile {
        scan_data: grid.clone(),
    };
    fs::write(path, serde_json::to_string(&file)?)?;
    Ok(())
}

/// Write centers as CSV with a header row, even when `centers` is empty.
pub fn write_centers_csv<W: Write>(centers: &[DetectedCenter], writer: W) -> Result<(), IoError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for c in centers {
        wtr.write_record([
            c.id.to_string(),
            c.x.to_string(),
            c.y.to_string(),
            c.size.to_string(),
            c.intensity.to_string(),
            c.confidence.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read centers back from a CSV export.
pub fn read_centers_csv<R: Read>(reader: R) -> Result<Vec<DetectedCenter>, IoError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.iter().ne(CSV_HEADER) {
        return Err(IoError::CsvField {
            row: 0,
            message: format!("unexpected header {:?}", headers.iter().collect::<Vec<_>>()),
        });
    }

    let mut centers = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let fields: Vec<&str> = record.iter().collect();
        if fields.len() != CSV_HEADER.len() {
            return Err(IoError::CsvField {
                row,
                message: format!("expected {} columns, got {}", CSV_HEADER.len(), fields.len()),
            });
        }
        centers.push(DetectedCenter {
            id: parse_field(&fields, 0, row)?,
            x: parse_field(&fields, 1, row)?,
            y: parse_field(&fields, 2, row)?,
            size: parse_field(&fields, 3, row)?,
            intensity: parse_field(&fields, 4, row)?,
            confidence: parse_field(&fields, 5, row)?,
        });
    }
    Ok(centers)
}

fn parse_field<T>(fields: &[&str], idx: usize, row: usize) -> Result<T, IoError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fields[idx].parse().map_err(|e| IoError::CsvField {
        row,
        message: format!("{}: {e}", CSV_HEADER[idx]),
    })
}

impl DetectionReport {
    /// Load a report from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write the centers of this report to disk as CSV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let file = fs::File::create(path)?;
        write_centers_csv(&self.centers, std::io::BufWriter::new(file))
    }
}

/// A single detection run described in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub scan_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub csv_path: Option<String>,
    /// Partial detection parameters; missing keys take their defaults.
    #[serde(default)]
    pub params: Option<DetectionConfig>,
}

impl RunConfig {
    /// Load a JSON run configuration from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this configuration to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("nv_detect_report.json"))
    }

    pub fn csv_path(&self) -> Option<PathBuf> {
        self.csv_path.as_ref().map(PathBuf::from)
    }

    /// Detection parameters, defaults filled in.
    pub fn detection_config(&self) -> DetectionConfig {
        self.params.clone().unwrap_or_default()
    }

    /// Build a validated detector from this configuration.
    pub fn build_detector(&self) -> Result<NvDetector, DetectError> {
        NvDetector::new(self.detection_config())
    }

    /// Load the scan, run detection and write the configured outputs.
    pub fn run(&self) -> Result<DetectionReport, IoError> {
        let detector = self.build_detector()?;
        log::info!("loading scan {}", self.scan_path);
        let grid = load_scan(&self.scan_path)?;
        log::info!("scan size {}x{}", grid.width(), grid.height());
        let report = detector.detect(&grid)?;

        let output_path = self.output_path();
        report.write_json(&output_path)?;
        log::info!("report written to {}", output_path.display());
        if let Some(csv_path) = self.csv_path() {
            report.write_csv(&csv_path)?;
            log::info!("centers written to {}", csv_path.display());
        }
        Ok(report)
    }
}
