//! Logging setup for the crosspost binary
//!
//! All output goes to stderr so stdout stays reserved for the dispatch
//! report. The level comes from `--verbose`, then `CROSSPOST_LOG_LEVEL`,
//! then `RUST_LOG`, and HTTP internals are kept at `warn` unless a filter
//! asks for them explicitly.
//!
//! ```no_run
//! use libcrosspost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "debug".to_string(), false).init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Directives appended to every filter to silence transport chatter
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without colors
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line colored output for local debugging
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "Unknown log format '{}' (expected text, json or pretty)",
                other
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Read `CROSSPOST_LOG_FORMAT` / `CROSSPOST_LOG_LEVEL`, letting explicit
    /// command-line values win
    pub fn from_env(format: Option<LogFormat>, verbose: bool) -> Self {
        let format = format
            .or_else(|| {
                std::env::var("CROSSPOST_LOG_FORMAT")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_default();
        let level = std::env::var("CROSSPOST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, verbose)
    }

    /// The filter directive string this configuration resolves to
    pub fn directives(&self) -> String {
        let base = if self.verbose {
            "debug".to_string()
        } else {
            std::env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone())
        };

        with_quiet_dependencies(&base)
    }

    /// Install the global subscriber
    ///
    /// A second call is a no-op, so tests and binaries can both call it.
    pub fn init(&self) {
        let filter = EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let _ = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => builder.with_ansi(false).with_target(false).try_init(),
        };
    }
}

/// Append the dependency defaults the user filter does not already set.
///
/// Only an exact target match counts: `hyper_util=debug` leaves `hyper=warn`
/// in place, while a more specific `hyper::proto=trace` still wins over it.
fn with_quiet_dependencies(base: &str) -> String {
    let targets: Vec<&str> = base
        .split(',')
        .filter_map(|directive| {
            let target = directive.split(['=', '[']).next()?.trim();
            (!target.is_empty()).then_some(target)
        })
        .collect();

    let mut directives = vec![base.to_string()];
    for quiet in QUIET_DEPENDENCIES {
        let target = quiet.split('=').next().unwrap_or_default();
        if !targets.contains(&target) {
            directives.push(quiet.to_string());
        }
    }
    directives.join(",")
}

/// Initialize logging purely from environment variables
pub fn init_default() {
    LoggingConfig::from_env(None, false).init();
}
