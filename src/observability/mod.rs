//! Observability: structured logging through `tracing-subscriber`.

mod tracing_init;

pub use tracing_init::*;
