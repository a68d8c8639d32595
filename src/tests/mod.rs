//! Consolidated test modules.
//!
//! End-to-end tests that drive full retention runs from a TOML configuration
//! against the in-memory store.
