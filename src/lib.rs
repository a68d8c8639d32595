//! Daily RDS snapshot creation and tiered weekly snapshot retention.
//!
//! A run takes one snapshot per resource per day and prunes older snapshots
//! so that the current week keeps a handful, the previous weeks keep fewer,
//! and nothing survives past the horizon week.
//!
//! - [`retention`]: the pure decision engine and the run orchestrator
//! - [`snapshots`]: the store abstraction plus in-memory and RDS backends
//! - [`config`]: TOML configuration

pub mod config;
#[cfg(feature = "cli")]
pub mod observability;
pub mod retention;
pub mod snapshots;

#[cfg(test)]
mod tests;
