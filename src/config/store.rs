//! Snapshot store configuration.

use serde::{Deserialize, Serialize};

/// Where resources and snapshots live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process store that starts empty. Only useful for trying out a
    /// configuration.
    #[default]
    Memory,

    /// AWS RDS. Requires the `store-rds` feature.
    #[cfg(feature = "store-rds")]
    Rds(RdsConfig),
}

impl StoreConfig {
    pub fn is_memory(&self) -> bool {
        matches!(self, StoreConfig::Memory)
    }
}

/// Configuration for the RDS store.
///
/// Credentials come from the standard AWS chain. The region of each call is
/// taken from the top-level `regions` list.
#[cfg(feature = "store-rds")]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RdsConfig {
    /// Custom endpoint URL (e.g., "http://localhost:4566" for localstack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        store: StoreConfig,
    }

    #[test]
    fn test_memory_store() {
        let w: Wrapper = toml::from_str("[store]\ntype = \"memory\"").unwrap();
        assert!(w.store.is_memory());
        assert!(StoreConfig::default().is_memory());
    }

    #[test]
    #[cfg(feature = "store-rds")]
    fn test_rds_store() {
        let w: Wrapper = toml::from_str(
            r#"
            [store]
            type = "rds"
            endpoint_url = "http://localhost:4566"
        "#,
        )
        .unwrap();
        assert_eq!(
            w.store,
            StoreConfig::Rds(RdsConfig {
                endpoint_url: Some("http://localhost:4566".into()),
            })
        );

        let w: Wrapper = toml::from_str("[store]\ntype = \"rds\"").unwrap();
        assert_eq!(w.store, StoreConfig::Rds(RdsConfig::default()));
    }

    #[test]
    fn test_unknown_store_rejected() {
        let result: Result<Wrapper, _> = toml::from_str("[store]\ntype = \"s3\"");
        assert!(result.is_err());
    }
}
