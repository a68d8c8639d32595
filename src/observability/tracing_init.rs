//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig, ObservabilityConfig};

/// Crates whose logs are quieted unless a filter says otherwise.
const DEFAULT_DIRECTIVES: &str =
    "aws_config=warn,aws_smithy_runtime=warn,aws_smithy_runtime_api=warn,hyper=warn,h2=warn";

/// Initialize the tracing subscriber with the given configuration.
///
/// Sets up console logging in the configured format (pretty, compact, JSON)
/// with environment-based filtering. `RUST_LOG` takes precedence over the
/// configured level and filter.
///
/// Logs go to stderr so stdout carries only the run report.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TracingError> {
    let logging = &config.logging;
    let filter = build_env_filter(logging);

    let result = match (logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Pretty, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Compact, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, true) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        (LogFormat::Json, false) => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_file(logging.file_line)
                .with_line_number(logging.file_line)
                .without_time();
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = filter_directives(config, rust_log.as_deref());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

/// Filter directives in effect: `RUST_LOG` if set, otherwise the configured
/// level plus either the configured filter or the default quieting.
fn filter_directives(config: &LoggingConfig, rust_log: Option<&str>) -> String {
    let base_level = config.level.as_str();

    if let Some(env_filter) = rust_log {
        env_filter.to_string()
    } else if let Some(filter) = &config.filter {
        format!("{base_level},{filter}")
    } else {
        format!("{base_level},{DEFAULT_DIRECTIVES}")
    }
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_directives() {
        let config = LoggingConfig::default();
        let directives = filter_directives(&config, None);
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("aws_smithy_runtime=warn"));
    }

    #[test]
    fn test_configured_filter() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("snapwarden=debug".into()),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config, None), "warn,snapwarden=debug");
    }

    #[test]
    fn test_rust_log_wins() {
        let config = LoggingConfig {
            filter: Some("snapwarden=debug".into()),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config, Some("trace")), "trace");
    }
}
