//! Application-level configuration.
//!
//! - [`RelayConfig`]: deadlines, user-facing texts and storage locations the
//!   handlers need at runtime

pub mod relay_config;

pub use relay_config::RelayConfig;
