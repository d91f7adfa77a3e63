//! `nvision` command-line tool: detect NV centers in scan files, in batch,
//! and generate synthetic scans.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use nvision::detection::{synthetic, write_centers_csv, IntensityHistogram, HISTOGRAM_BINS};
use nvision::{
    load_scan, write_scan, Connectivity, DetectionConfig, DetectionReport, DetectionSummary,
    NvDetector, RunConfig, SyntheticScanParams,
};
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliError = Box<dyn Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "nvision", version)]
#[command(about = "Detect NV centers in confocal scan grids")]
struct Cli {
    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect NV centers in one scan.
    Detect(DetectArgs),
    /// Detect NV centers in many scans in parallel.
    Batch(BatchArgs),
    /// Write a synthetic scan with known spot positions.
    Generate(GenerateArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Four => Connectivity::Four,
            ConnectivityArg::Eight => Connectivity::Eight,
        }
    }
}

/// Detection parameter overrides, applied on top of defaults or a run config.
#[derive(Args, Debug, Default)]
struct ParamArgs {
    /// Threshold as a fraction of the processed maximum, in [0, 1].
    #[arg(long)]
    threshold: Option<f64>,

    /// Smallest accepted region, in pixels.
    #[arg(long)]
    min_size: Option<usize>,

    /// Largest accepted region, in pixels.
    #[arg(long)]
    max_size: Option<usize>,

    /// Minimum confidence of an accepted region, in [0, 1].
    #[arg(long)]
    confidence_threshold: Option<f64>,

    /// Skip background removal.
    #[arg(long)]
    no_background_correction: bool,

    /// Gaussian scale of the background estimate, in pixels.
    #[arg(long)]
    background_sigma: Option<f64>,

    /// Skip the median filter.
    #[arg(long)]
    no_median_filter: bool,

    /// Median window size (odd).
    #[arg(long)]
    filter_size: Option<usize>,

    /// Pixel adjacency used for labeling.
    #[arg(long, value_enum)]
    connectivity: Option<ConnectivityArg>,
}

impl ParamArgs {
    fn apply(&self, mut config: DetectionConfig) -> DetectionConfig {
        if let Some(v) = self.threshold {
            config.threshold = v;
        }
        if let Some(v) = self.min_size {
            config.min_size = v;
        }
        if let Some(v) = self.max_size {
            config.max_size = v;
        }
        if let Some(v) = self.confidence_threshold {
            config.confidence_threshold = v;
        }
        if self.no_background_correction {
            config.background_correction = false;
        }
        if let Some(v) = self.background_sigma {
            config.background_sigma = v;
        }
        if self.no_median_filter {
            config.median_filter = false;
        }
        if let Some(v) = self.filter_size {
            config.filter_size = v;
        }
        if let Some(v) = self.connectivity {
            config.connectivity = v.into();
        }
        config
    }
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Scan JSON (`{"scan_data": [[...], ...]}`). Overrides the run config.
    #[arg(long)]
    scan: Option<PathBuf>,

    /// Report JSON output. Overrides the run config.
    #[arg(long)]
    out: Option<PathBuf>,

    /// CSV export of the detected centers. Overrides the run config.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Run configuration JSON (`scan_path`, `output_path`, `csv_path`, `params`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print an intensity histogram of the detected centers.
    #[arg(long)]
    histogram: bool,

    #[command(flatten)]
    params: ParamArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Scan JSON files.
    #[arg(required = true)]
    scans: Vec<PathBuf>,

    /// Directory receiving `<stem>_report.json` per scan; stems must be unique.
    #[arg(long)]
    out_dir: PathBuf,

    /// Also write `<stem>_centers.csv` per scan.
    #[arg(long)]
    csv: bool,

    /// Detection parameters JSON; missing keys take their defaults.
    #[arg(long)]
    params: Option<PathBuf>,

    #[command(flatten)]
    overrides: ParamArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Scan JSON output.
    #[arg(long)]
    out: PathBuf,

    /// Ground-truth spots JSON output.
    #[arg(long)]
    truth: Option<PathBuf>,

    #[arg(long, default_value_t = 500)]
    width: usize,

    #[arg(long, default_value_t = 500)]
    height: usize,

    /// Number of spots to place.
    #[arg(long, default_value_t = 20)]
    centers: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Uniform background noise amplitude.
    #[arg(long, default_value_t = 0.1)]
    noise: f64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Detect(args) => run_detect(args),
        Commands::Batch(args) => run_batch(args),
        Commands::Generate(args) => run_generate(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    nvision::init_tracing(cli.json_logs, cli.log_level.into());
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    if let Err(err) = nvision::init_with_level(cli.log_level.into()) {
        eprintln!("failed to install logger: {err}");
    }
}

fn summary_line(label: &str, report: &DetectionReport) -> String {
    let s = DetectionSummary::from_report(report);
    format!(
        "{label}: {} centers (avg size {:.2}, avg intensity {:.3}, avg confidence {:.3}, density {:.6})",
        s.total, s.average_size, s.average_intensity, s.average_confidence, s.density
    )
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn run_detect(args: DetectArgs) -> CliResult<()> {
    let loaded = match &args.config {
        Some(path) => Some(RunConfig::load_json(path)?),
        None => None,
    };

    let scan_path = args
        .scan
        .as_deref()
        .map(path_string)
        .or_else(|| loaded.as_ref().map(|r| r.scan_path.clone()))
        .ok_or("no scan given: pass --scan or a --config with scan_path")?;
    let base = loaded
        .as_ref()
        .map(RunConfig::detection_config)
        .unwrap_or_default();
    let run = RunConfig {
        scan_path,
        output_path: args
            .out
            .as_deref()
            .map(path_string)
            .or_else(|| loaded.as_ref().and_then(|r| r.output_path.clone())),
        csv_path: args
            .csv
            .as_deref()
            .map(path_string)
            .or_else(|| loaded.as_ref().and_then(|r| r.csv_path.clone())),
        params: Some(args.params.apply(base)),
    };

    let report = run.run()?;
    println!("{}", summary_line(&run.scan_path, &report));
    if args.histogram {
        print_histogram(&IntensityHistogram::from_centers(
            &report.centers,
            HISTOGRAM_BINS,
        ));
    }
    Ok(())
}

fn print_histogram(hist: &IntensityHistogram) {
    print!("{}", histogram_lines(hist));
}

/// One `[lo, hi) count` line per bin; the last bin is closed.
fn histogram_lines(hist: &IntensityHistogram) -> String {
    let last = hist.bins() - 1;
    hist.counts
        .iter()
        .enumerate()
        .map(|(i, count)| {
            let close = if i == last { ']' } else { ')' };
            format!(
                "[{:.3}, {:.3}{close} {count}\n",
                hist.edges[i],
                hist.edges[i + 1]
            )
        })
        .collect()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string())
}

/// Reject inputs whose reports would land on the same file.
fn check_unique_stems(scans: &[PathBuf]) -> CliResult<()> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(scans.len());
    for path in scans {
        let stem = stem(path);
        if let Some(first) = seen.insert(stem.clone(), path.as_path()) {
            return Err(format!(
                "{} and {} would both write {stem}_report.json",
                first.display(),
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn run_batch(args: BatchArgs) -> CliResult<()> {
    let base = match &args.params {
        Some(path) => load_params(path)?,
        None => DetectionConfig::default(),
    };
    let detector = NvDetector::new(args.overrides.apply(base))?;
    check_unique_stems(&args.scans)?;
    fs::create_dir_all(&args.out_dir)?;

    let mut failed = 0usize;
    let mut grids = Vec::with_capacity(args.scans.len());
    let mut names = Vec::with_capacity(args.scans.len());
    for path in &args.scans {
        match load_scan(path) {
            Ok(grid) => {
                grids.push(grid);
                names.push(path.as_path());
            }
            Err(err) => {
                log::error!("{}: {err}", path.display());
                failed += 1;
            }
        }
    }

    log::info!("detecting in {} scans", grids.len());
    for (path, result) in names.iter().zip(detector.detect_many(&grids)) {
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                log::error!("{}: {err}", path.display());
                failed += 1;
                continue;
            }
        };
        let stem = stem(path);
        report.write_json(args.out_dir.join(format!("{stem}_report.json")))?;
        if args.csv {
            let file = fs::File::create(args.out_dir.join(format!("{stem}_centers.csv")))?;
            write_centers_csv(&report.centers, std::io::BufWriter::new(file))?;
        }
        println!("{}", summary_line(&path.display().to_string(), &report));
    }

    if failed > 0 {
        return Err(format!("{failed} of {} scans failed", args.scans.len()).into());
    }
    Ok(())
}

fn load_params(path: &Path) -> CliResult<DetectionConfig> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn run_generate(args: GenerateArgs) -> CliResult<()> {
    let params = SyntheticScanParams {
        width: args.width,
        height: args.height,
        centers: args.centers,
        noise: args.noise,
        seed: args.seed,
        ..SyntheticScanParams::default()
    };
    let scan = synthetic::generate(&params)?;
    write_scan(&scan.grid, &args.out)?;
    log::info!("scan written to {}", args.out.display());

    if let Some(path) = &args.truth {
        fs::write(path, serde_json::to_string_pretty(&scan.spots)?)?;
        log::info!("ground truth written to {}", path.display());
    }

    println!(
        "generated {}x{} scan with {} spots (seed {})",
        args.width,
        args.height,
        scan.spots.len(),
        args.seed
    );
    Ok(())
}
