//! Configuration module for snapwarden.
//!
//! The warden is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! regions = ["eu-west-1", "ap-southeast-2"]
//!
//! [store]
//! type = "rds"
//! endpoint_url = "${RDS_ENDPOINT_URL}"
//!
//! [retention]
//! horizon_weeks = 16
//! ```

mod creation;
mod observability;
mod retention;
mod store;

use std::{collections::HashSet, path::Path};

pub use creation::*;
pub use observability::*;
pub use retention::*;
use serde::{Deserialize, Serialize};
pub use store::*;

/// Root configuration for snapwarden.
///
/// Only `regions` is required; every section has defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Regions whose resources are backed up.
    #[serde(default)]
    pub regions: Vec<String>,

    /// Snapshot store backend.
    #[serde(default)]
    pub store: StoreConfig,

    /// Weekly retention policy and run safety settings.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Settings applied to newly created snapshots.
    #[serde(default)]
    pub creation: CreationConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Feature-gated values get an actionable error instead of serde's
        // "unknown variant".
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let config: WardenConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one region must be configured in `regions`".into(),
            ));
        }
        if self.regions.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "`regions` must not contain empty names".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.regions.iter().find(|r| !seen.insert(r.trim())) {
            return Err(ConfigError::Validation(format!(
                "region `{}` is listed more than once in `regions`",
                dup.trim()
            )));
        }

        self.retention.validate().map_err(ConfigError::Validation)?;
        self.creation.validate().map_err(ConfigError::Validation)?;

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Check for feature-gated configuration values before typed deserialization.
fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let mut issues: Vec<(String, &str)> = Vec::new();

    if let Some(type_val) = raw
        .get("store")
        .and_then(|v| v.get("type"))
        .and_then(|v| v.as_str())
    {
        check_store_feature(type_val, &mut issues);
    }

    if issues.is_empty() {
        return Ok(());
    }

    let details = issues
        .iter()
        .map(|(msg, _)| msg.as_str())
        .collect::<Vec<_>>()
        .join("\n  - ");
    let features = issues
        .iter()
        .map(|(_, feat)| *feat)
        .collect::<Vec<_>>()
        .join(",");

    Err(ConfigError::Validation(format!(
        "Configuration requires features not compiled in this build:\n  \
         - {details}\n\n\
         Rebuild with: cargo build --features {features}\n\
         Or use the 'full' profile: cargo build --features full\n\
         Run 'snapwarden features' to see all available features."
    )))
}

fn check_store_feature(type_val: &str, _issues: &mut Vec<(String, &str)>) {
    match type_val {
        #[cfg(not(feature = "store-rds"))]
        "rds" => _issues.push((
            "store type 'rds' requires the 'store-rds' feature".into(),
            "store-rds",
        )),
        _ => {}
    }
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left as written.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid env var pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
