//! Tiered weekly retention policy.

use std::collections::BTreeMap;

use chrono::Weekday;

use crate::config::RetentionConfig;

/// What the filter does with one weekly bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeekRule<'a> {
    /// Keep snapshots created on one of these weekdays, delete the rest.
    KeepWeekdays(&'a [Weekday]),
    /// Delete every snapshot in the bucket.
    DeleteAll,
    /// Never select anything in this bucket.
    Retain,
}

/// Keep rules per week offset, the purge horizon, and the current-week
/// population guard.
///
/// Pure data: the bucketer and filter only read it, so swapping in a
/// different policy (e.g. a two week horizon) needs no code changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep: BTreeMap<u32, Vec<Weekday>>,
    horizon_weeks: u32,
    min_current_week_snapshots: usize,
    week_starts_on: Weekday,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(16, 4)
            .with_keep(0, [Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat])
            .with_keep(1, [Weekday::Mon, Weekday::Fri])
            .with_keep(2, [Weekday::Mon])
    }
}

impl RetentionPolicy {
    /// A policy with no keep rules: only the horizon bucket is purged.
    pub fn new(horizon_weeks: u32, min_current_week_snapshots: usize) -> Self {
        Self {
            keep: BTreeMap::new(),
            horizon_weeks,
            min_current_week_snapshots,
            week_starts_on: Weekday::Sun,
        }
    }

    /// Keep only snapshots created on `weekdays` in the bucket at `offset`.
    pub fn with_keep(mut self, offset: u32, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = weekdays.into_iter().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        self.keep.insert(offset, days);
        self
    }

    /// Set the first day of the week used to anchor bucket boundaries.
    pub fn with_week_start(mut self, weekday: Weekday) -> Self {
        self.week_starts_on = weekday;
        self
    }

    /// Offset whose bucket is purged unconditionally.
    pub fn horizon_weeks(&self) -> u32 {
        self.horizon_weeks
    }

    /// Smallest current-week bucket that may be pruned.
    pub fn min_current_week_snapshots(&self) -> usize {
        self.min_current_week_snapshots
    }

    pub fn week_starts_on(&self) -> Weekday {
        self.week_starts_on
    }

    /// The rule governing the bucket at `offset`.
    ///
    /// The horizon wins over any keep rule configured for the same offset.
    pub fn rule(&self, offset: u32) -> WeekRule<'_> {
        if offset == self.horizon_weeks {
            return WeekRule::DeleteAll;
        }
        match self.keep.get(&offset) {
            Some(days) => WeekRule::KeepWeekdays(days),
            None => WeekRule::Retain,
        }
    }

    /// Offsets that can contribute deletions, ascending.
    pub fn governed_offsets(&self) -> Vec<u32> {
        let mut offsets: Vec<u32> = self
            .keep
            .keys()
            .copied()
            .filter(|offset| *offset < self.horizon_weeks)
            .collect();
        offsets.push(self.horizon_weeks);
        offsets
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        let policy = Self::new(config.horizon_weeks, config.min_current_week_snapshots)
            .with_week_start(config.week_starts_on);
        config
            .weeks
            .iter()
            .fold(policy, |policy, week| {
                policy.with_keep(week.offset, week.keep.iter().copied())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_table() {
        let policy = RetentionPolicy::default();
        assert_eq!(
            policy.rule(0),
            WeekRule::KeepWeekdays(&[Weekday::Mon, Weekday::Wed, Weekday::Fri, Weekday::Sat])
        );
        assert_eq!(
            policy.rule(1),
            WeekRule::KeepWeekdays(&[Weekday::Mon, Weekday::Fri])
        );
        assert_eq!(policy.rule(2), WeekRule::KeepWeekdays(&[Weekday::Mon]));
        for offset in 3..16 {
            assert_eq!(policy.rule(offset), WeekRule::Retain, "offset {offset}");
        }
        assert_eq!(policy.rule(16), WeekRule::DeleteAll);
        assert_eq!(policy.rule(17), WeekRule::Retain);
        assert_eq!(policy.min_current_week_snapshots(), 4);
        assert_eq!(policy.week_starts_on(), Weekday::Sun);
    }

    #[test]
    fn test_governed_offsets() {
        assert_eq!(RetentionPolicy::default().governed_offsets(), vec![0, 1, 2, 16]);
        assert_eq!(RetentionPolicy::new(2, 4).governed_offsets(), vec![2]);
    }

    #[test]
    fn test_horizon_overrides_keep_rule() {
        let policy = RetentionPolicy::new(2, 4)
            .with_keep(0, [Weekday::Mon])
            .with_keep(2, [Weekday::Mon]);
        assert_eq!(policy.rule(2), WeekRule::DeleteAll);
        assert_eq!(policy.governed_offsets(), vec![0, 2]);
    }

    #[test]
    fn test_keep_days_are_normalized() {
        let policy =
            RetentionPolicy::new(16, 4).with_keep(0, [Weekday::Fri, Weekday::Mon, Weekday::Fri]);
        assert_eq!(
            policy.rule(0),
            WeekRule::KeepWeekdays(&[Weekday::Mon, Weekday::Fri])
        );
    }

    #[test]
    fn test_default_config_matches_default_policy() {
        let policy = RetentionPolicy::from(&RetentionConfig::default());
        assert_eq!(policy, RetentionPolicy::default());
    }
}
