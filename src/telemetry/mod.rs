//! Logging setup
//!
//! Installs a `tracing` subscriber built from [`LoggingConfig`](crate::config::LoggingConfig):
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, falling back to the configured level)
//!   └── Fmt Layer (pretty or JSON console output)
//! ```

pub mod subscriber;

pub use subscriber::{build_env_filter, init_subscriber, TelemetryError};
