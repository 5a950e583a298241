//! Tracing setup: stdout plus a daily-rolling file, with a reloadable filter.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Levels accepted by the `logLevel` command.
pub const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Handle for changing the log filter at runtime.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    /// Replace the active filter with `level`.
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        let level = parse_level(level)
            .ok_or_else(|| anyhow::anyhow!("unknown log level: {level}"))?;
        self.handle
            .modify(|filter| *filter = EnvFilter::new(level))
            .map_err(|e| anyhow::anyhow!("failed to reload log filter: {e}"))
    }

    /// Current filter directives.
    pub fn current(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Normalize a user-supplied level name.
pub fn parse_level(level: &str) -> Option<&'static str> {
    let level = level.trim().to_ascii_lowercase();
    LEVELS.iter().copied().find(|l| *l == level)
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. The returned guard flushes the file
/// writer and must live until exit.
pub fn init(log_dir: &Path, default_level: &str) -> anyhow::Result<(LogControl, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "chorus.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(default_level).unwrap_or("info")));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok((LogControl { handle }, guard))
}

/// Stdout-only logging for short CLI runs.
pub fn init_console(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(parse_level(default_level).unwrap_or("info"))),
        )
        .init();
}
