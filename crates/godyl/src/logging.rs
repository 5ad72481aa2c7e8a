//! Log subscriber for the godyl binary.
//!
//! Everything is written to stderr; stdout carries command output only.
//! `RUST_LOG` wins over `--level` when set.

use std::io;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use uuid::Uuid;

/// Crates whose events pass the default filter.
const CRATES: &[&str] = &[
    "godyl",
    "godyl_core",
    "godyl_tools_github",
    "godyl_tools_gitlab",
    "godyl_tools_url",
    "godyl_tools_go",
    "godyl_tools_command",
];

/// Verbosity accepted by `--level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// Default.
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One compact line per event, for terminals.
    Text,
    /// Newline-delimited JSON with span context, used with `--json`.
    Json,
}

impl LogFormat {
    #[must_use]
    pub const fn for_output(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

/// Id attached to the top-level command span.
pub fn correlation_id() -> Uuid {
    static ID: OnceLock<Uuid> = OnceLock::new();
    *ID.get_or_init(Uuid::new_v4)
}

fn directive(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn filter(level: Level) -> miette::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(directive(level))
            .map_err(|e| miette::miette!("invalid log filter: {e}")),
    }
}

fn layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .boxed(),
    }
}

/// Install the global subscriber.
pub fn init(format: LogFormat, level: Level) -> miette::Result<()> {
    tracing_subscriber::registry()
        .with(layer(format))
        .with(filter(level)?)
        .try_init()
        .map_err(|e| miette::miette!("logging already initialised: {e}"))?;

    tracing::debug!(
        correlation_id = %correlation_id(),
        version = godyl_core::VERSION,
        ?format,
        "Logging ready"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_lists_every_crate() {
        let directive = directive(Level::INFO);
        assert_eq!(directive.split(',').count(), CRATES.len());
        assert!(directive.contains("godyl_core=info"));
        assert!(directive.contains("godyl_tools_go=info"));
    }

    #[test]
    fn test_format_follows_json_flag() {
        assert_eq!(LogFormat::for_output(true), LogFormat::Json);
        assert_eq!(LogFormat::for_output(false), LogFormat::Text);
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_correlation_id_is_stable() {
        assert_eq!(correlation_id(), correlation_id());
    }
}
