//! Stderr logger for the `nvision` tools.
//!
//! Records are printed as `[elapsed LEVEL] message`. Debug and trace records
//! also carry the emitting module so pipeline stages can be told apart.
//! Library code only uses the `log` facade; nothing is printed until a binary
//! installs this logger (or a `tracing` subscriber).

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

fn format_record(elapsed: f64, level: Level, target: &str, message: &str) -> String {
    if level >= Level::Debug {
        format!("[{elapsed:7.3}s {level:>5}] {target}: {message}")
    } else {
        format!("[{elapsed:7.3}s {level:>5}] {message}")
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Only the first call installs the logger; later calls keep the first
/// level and return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, falling back to
/// `default_level` when the variable is unset.
///
/// Span close events are reported so per-stage timings show up in the output.
/// Records emitted through the `log` facade are forwarded to the subscriber.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string().to_lowercase()));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}
