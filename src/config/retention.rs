//! Snapshot retention configuration.
//!
//! Controls which snapshots survive each week and when the oldest ones are
//! purged.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! horizon_weeks = 16
//! min_current_week_snapshots = 4
//! week_starts_on = "sun"
//! max_concurrent_regions = 2
//!
//! [[retention.weeks]]
//! offset = 0
//! keep = ["mon", "wed", "fri", "sat"]
//!
//! [[retention.weeks]]
//! offset = 1
//! keep = ["mon", "fri"]
//!
//! [[retention.weeks]]
//! offset = 2
//! keep = ["mon"]
//!
//! [retention.safety]
//! dry_run = false
//! ```

use std::collections::HashSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Snapshot retention configuration.
///
/// Weeks are counted back from the current week (offset 0). Offsets with a
/// `weeks` entry keep only snapshots taken on the listed weekdays; the
/// horizon week is purged entirely; every other week is left alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Week offset whose snapshots are all deleted.
    /// Default: 16
    #[serde(default = "default_horizon_weeks")]
    pub horizon_weeks: u32,

    /// Current-week snapshots are only pruned once at least this many exist.
    /// Default: 4
    #[serde(default = "default_min_current_week_snapshots")]
    pub min_current_week_snapshots: usize,

    /// First day of the week. Bucket boundaries fall on its midnight (UTC).
    /// Default: sun
    #[serde(default = "default_week_starts_on")]
    pub week_starts_on: Weekday,

    /// Per-week keep rules. Omitting this gives the standard tiered table.
    #[serde(default = "default_weeks")]
    pub weeks: Vec<WeekKeepConfig>,

    /// Regions processed at the same time.
    /// Default: 2
    #[serde(default = "default_max_concurrent_regions")]
    pub max_concurrent_regions: usize,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            horizon_weeks: default_horizon_weeks(),
            min_current_week_snapshots: default_min_current_week_snapshots(),
            week_starts_on: default_week_starts_on(),
            weeks: default_weeks(),
            max_concurrent_regions: default_max_concurrent_regions(),
            safety: RetentionSafety::default(),
        }
    }
}

/// Ten years of weekly buckets.
pub const MAX_HORIZON_WEEKS: u32 = 520;

impl RetentionConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.horizon_weeks == 0 {
            return Err("retention.horizon_weeks must be at least 1".into());
        }
        if self.horizon_weeks > MAX_HORIZON_WEEKS {
            return Err(format!(
                "retention.horizon_weeks must be at most {MAX_HORIZON_WEEKS}, got {}",
                self.horizon_weeks
            ));
        }
        if self.max_concurrent_regions == 0 {
            return Err("retention.max_concurrent_regions must be at least 1".into());
        }

        let mut seen = HashSet::new();
        for week in &self.weeks {
            if !seen.insert(week.offset) {
                return Err(format!(
                    "retention.weeks has more than one rule for offset {}",
                    week.offset
                ));
            }
            if week.offset >= self.horizon_weeks {
                return Err(format!(
                    "retention.weeks rule for offset {} is at or beyond horizon_weeks ({})",
                    week.offset, self.horizon_weeks
                ));
            }
        }

        Ok(())
    }
}

fn default_horizon_weeks() -> u32 {
    16
}

fn default_min_current_week_snapshots() -> usize {
    4
}

fn default_week_starts_on() -> Weekday {
    Weekday::Sun
}

fn default_max_concurrent_regions() -> usize {
    2
}

fn default_weeks() -> Vec<WeekKeepConfig> {
    vec![
        WeekKeepConfig {
            offset: 0,
            keep: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat],
        },
        WeekKeepConfig {
            offset: 1,
            keep: vec![Weekday::Mon, Weekday::Fri],
        },
        WeekKeepConfig {
            offset: 2,
            keep: vec![Weekday::Mon],
        },
    ]
}

/// Keep rule for one week offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeekKeepConfig {
    /// Weeks before the current one (0 = this week).
    pub offset: u32,

    /// Weekdays whose snapshots are kept. An empty list deletes the whole
    /// week.
    pub keep: Vec<Weekday>,
}

/// Safety settings for retention runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, log and report what would be created and deleted without
    /// touching the store.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert_eq!(config.horizon_weeks, 16);
        assert_eq!(config.min_current_week_snapshots, 4);
        assert_eq!(config.week_starts_on, Weekday::Sun);
        assert_eq!(config.weeks.len(), 3);
        assert_eq!(config.max_concurrent_regions, 2);
        assert!(!config.safety.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            horizon_weeks = 8
            min_current_week_snapshots = 2
            week_starts_on = "mon"

            [[weeks]]
            offset = 0
            keep = ["tue", "thu"]

            [[weeks]]
            offset = 3
            keep = []

            [safety]
            dry_run = true
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.horizon_weeks, 8);
        assert_eq!(config.min_current_week_snapshots, 2);
        assert_eq!(config.week_starts_on, Weekday::Mon);
        assert_eq!(
            config.weeks,
            vec![
                WeekKeepConfig {
                    offset: 0,
                    keep: vec![Weekday::Tue, Weekday::Thu],
                },
                WeekKeepConfig {
                    offset: 3,
                    keep: vec![],
                },
            ]
        );
        assert_eq!(config.max_concurrent_regions, 2);
        assert!(config.safety.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RetentionConfig = toml::from_str("horizon_weeks = 20").unwrap();
        assert_eq!(config.horizon_weeks, 20);
        assert_eq!(config.weeks, default_weeks());
        assert_eq!(config.week_starts_on, Weekday::Sun);
    }

    #[test]
    fn test_long_weekday_names() {
        let config: RetentionConfig = toml::from_str(
            r#"
            [[weeks]]
            offset = 1
            keep = ["Monday", "friday"]
        "#,
        )
        .unwrap();
        assert_eq!(config.weeks[0].keep, vec![Weekday::Mon, Weekday::Fri]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<RetentionConfig, _> = toml::from_str("interval_hours = 24");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let config = RetentionConfig {
            horizon_weeks: 0,
            weeks: vec![],
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("horizon_weeks"));
    }

    #[test]
    fn test_oversized_horizon_rejected() {
        let config: RetentionConfig = toml::from_str("horizon_weeks = 4000000000").unwrap();
        assert!(config.validate().unwrap_err().contains("at most 520"));

        let config = RetentionConfig {
            horizon_weeks: MAX_HORIZON_WEEKS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = RetentionConfig {
            max_concurrent_regions: 0,
            ..Default::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .contains("max_concurrent_regions")
        );
    }

    #[test]
    fn test_duplicate_offset_rejected() {
        let mut config = RetentionConfig::default();
        config.weeks.push(WeekKeepConfig {
            offset: 1,
            keep: vec![Weekday::Sun],
        });
        assert!(config.validate().unwrap_err().contains("offset 1"));
    }

    #[test]
    fn test_rule_at_horizon_rejected() {
        let config = RetentionConfig {
            horizon_weeks: 2,
            ..Default::default()
        };
        // The default table has a rule for offset 2.
        assert!(config.validate().unwrap_err().contains("beyond horizon_weeks"));
    }
}
