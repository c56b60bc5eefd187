//! Shared tracing configuration for the smimon workspace.
//!
//! Every entry point (the C ABI crate, integration tests, benchmarks) installs
//! its subscriber through this crate so that filters and output formats are
//! driven by the same environment variables:
//!
//! | Variable                | Meaning                                        |
//! |-------------------------|------------------------------------------------|
//! | `SMIMON_LOG_PROFILE`    | `local` (pretty, ANSI) or `ci` (JSON, no ANSI) |
//! | `SMIMON_LOG_FORMAT`     | `pretty`, `compact` or `json`                  |
//! | `SMIMON_LOG_DIRECTIVES` | `EnvFilter` directives, e.g. `smimon_core=debug` |
//! | `SMIMON_LOG_TIMING_US`  | threshold for [`TimedSpan`] reports            |
//!
//! When no directives are configured the filter falls back to `RUST_LOG` and
//! finally to `info`.

pub mod timing;

#[macro_use]
pub mod macros;

use std::env;
use std::error::Error;
use std::fmt;

pub use timing::TimedSpan;
pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

pub const PROFILE_ENV: &str = "SMIMON_LOG_PROFILE";
pub const FORMAT_ENV: &str = "SMIMON_LOG_FORMAT";
pub const DIRECTIVES_ENV: &str = "SMIMON_LOG_DIRECTIVES";
pub const TIMING_THRESHOLD_ENV: &str = "SMIMON_LOG_TIMING_US";

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional directives (e.g. `smimon_core=debug,info`). When absent the
    /// filter falls back to `RUST_LOG` and then to [`Self::default_directive`].
    pub directives: Option<String>,
    /// Directive used when nothing else resolves to a valid filter.
    pub default_directive: String,
    /// Whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// ANSI colouring. Forced off for JSON output.
    pub ansi: bool,
    /// Span lifecycle events to emit.
    pub span_events: FmtSpan,
    pub output: TracingOutput,
    /// Minimum duration in microseconds before a [`TimedSpan`] reports.
    pub timing_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Pretty, ANSI-enabled output for interactive use.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            timing_threshold_us: None,
        }
    }

    /// JSON without ANSI codes, for CI and log collectors.
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Json,
            timing_threshold_us: None,
        }
    }

    /// Build a configuration from the `SMIMON_LOG_*` environment variables.
    pub fn from_env() -> Self {
        let profile = env::var(PROFILE_ENV)
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var(DIRECTIVES_ENV) {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var(FORMAT_ENV) {
            if let Some(parsed) = TracingOutput::from_env_value(&format) {
                config.output = parsed;
                if matches!(config.output, TracingOutput::Json) {
                    config.ansi = false;
                }
            }
        }

        if let Ok(threshold) = env::var(TIMING_THRESHOLD_ENV) {
            if let Ok(threshold_us) = threshold.trim().parse::<u64>() {
                config.timing_threshold_us = Some(threshold_us);
            }
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        if let Some(directives) = &self.directives {
            EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
        } else {
            match EnvFilter::try_from_default_env() {
                Ok(filter) => Ok(filter),
                Err(_) => Ok(EnvFilter::new(self.default_directive.clone())),
            }
        }
    }
}

/// Formatter used by the subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Errors surfaced when configuring the shared tracing subscriber fails.
#[derive(Debug)]
pub enum TracingSetupError {
    /// The directive string could not be parsed.
    InvalidFilter(String),
    /// Installing the global subscriber failed (usually because one is already set).
    SubscriberInit(tracing_subscriber::util::TryInitError),
}

impl fmt::Display for TracingSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracingSetupError::InvalidFilter(msg) => write!(f, "invalid tracing directive: {msg}"),
            TracingSetupError::SubscriberInit(err) => {
                write!(f, "failed to install global tracing subscriber: {err}")
            }
        }
    }
}

impl Error for TracingSetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TracingSetupError::SubscriberInit(err) => Some(err),
            _ => None,
        }
    }
}

/// Build a `tracing` subscriber using the provided configuration.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.resolve_filter()?;
    Ok(Registry::default().with(fmt_layer(config)).with(filter))
}

fn fmt_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = config.span_events.clone();
    match config.output {
        TracingOutput::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_span_events(span_events),
        ),
        TracingOutput::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .with_target(config.include_targets)
                .with_span_events(span_events)
                .with_ansi(false),
        ),
    }
}

/// Install the configured subscriber as the process-wide default.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    timing::set_default_threshold(config.timing_threshold_us);
    build_subscriber(config)?
        .try_init()
        .map_err(TracingSetupError::SubscriberInit)
}

/// Install a subscriber from the environment, ignoring "already installed".
///
/// Returns `true` when this call installed the subscriber.
pub fn init_from_env() -> bool {
    match init_global_tracing(&TracingConfig::from_env()) {
        Ok(()) => true,
        Err(TracingSetupError::SubscriberInit(_)) => false,
        Err(err) => {
            eprintln!("smimon-tracing: {err}; falling back to defaults");
            init_global_tracing(&TracingConfig::default()).is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn reset_env(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    const ALL_KEYS: &[&str] = &[PROFILE_ENV, FORMAT_ENV, DIRECTIVES_ENV, TIMING_THRESHOLD_ENV, "RUST_LOG"];

    #[test]
    #[serial]
    fn rejects_invalid_directive() {
        reset_env(ALL_KEYS);
        let config = TracingConfig {
            directives: Some("=::invalid".to_string()),
            ..TracingConfig::default()
        };
        assert!(matches!(build_subscriber(&config), Err(TracingSetupError::InvalidFilter(_))));
    }

    #[test]
    #[serial]
    fn builds_with_defaults() {
        reset_env(ALL_KEYS);
        assert!(build_subscriber(&TracingConfig::default()).is_ok());
        assert!(build_subscriber(&TracingConfig::for_ci()).is_ok());
    }

    #[test]
    #[serial]
    fn from_env_respects_profile_and_format() {
        reset_env(ALL_KEYS);
        env::set_var(PROFILE_ENV, "ci");
        env::set_var(FORMAT_ENV, "compact");
        env::set_var(DIRECTIVES_ENV, "smimon_core=debug");
        env::set_var(TIMING_THRESHOLD_ENV, "250");

        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("smimon_core=debug"));
        assert!(!config.ansi);
        assert_eq!(config.output, TracingOutput::Compact);
        assert_eq!(config.timing_threshold_us, Some(250));

        reset_env(ALL_KEYS);
    }

    #[test]
    #[serial]
    fn json_format_disables_ansi_on_local_profile() {
        reset_env(ALL_KEYS);
        env::set_var(FORMAT_ENV, "JSON");

        let config = TracingConfig::from_env();
        assert_eq!(config.output, TracingOutput::Json);
        assert!(!config.ansi);

        reset_env(ALL_KEYS);
    }

    #[test]
    #[serial]
    fn blank_directives_and_bad_threshold_are_ignored() {
        reset_env(ALL_KEYS);
        env::set_var(DIRECTIVES_ENV, "   ");
        env::set_var(TIMING_THRESHOLD_ENV, "soon");

        let config = TracingConfig::from_env();
        assert!(config.directives.is_none());
        assert!(config.timing_threshold_us.is_none());

        reset_env(ALL_KEYS);
    }

    #[test]
    fn output_parsing() {
        assert_eq!(TracingOutput::from_env_value(" pretty "), Some(TracingOutput::Pretty));
        assert_eq!(TracingOutput::from_env_value("xml"), None);
    }
}
