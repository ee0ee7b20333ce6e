//! Logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Default directive when neither `RUST_LOG` nor settings name one.
    pub const DEFAULT_FILTER: &'static str = "warn";

    /// Resolves settings. `RUST_LOG` wins over the configured filter, and
    /// `verbose` raises the default to `znanium=debug`.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let fallback = if verbose {
            "warn,znanium=debug"
        } else {
            Self::DEFAULT_FILTER
        };
        let directive = std::env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| settings.filter.clone())
            .unwrap_or_else(|| fallback.to_string());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            report_invalid_filter(&directive, &e);
            EnvFilter::new(Self::DEFAULT_FILTER)
        });

        Self {
            format: settings
                .format
                .as_deref()
                .map(LogFormat::parse)
                .unwrap_or_default(),
            filter,
            file: settings.file.clone(),
        }
    }
}

/// The subscriber is not installed yet, so stderr is the only channel.
#[allow(clippy::print_stderr)]
fn report_invalid_filter(directive: &str, error: &dyn std::fmt::Display) {
    eprintln!("Invalid log filter '{directive}': {error}");
}
