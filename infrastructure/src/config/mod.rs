//! Configuration loading for mqtt-gpt-relay
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Command-line flags (`--url`, `--proxy`, `--key`)
//! 2. Environment variables (`RELAY_SECTION__KEY`)
//! 3. `--config <path>` specified file
//! 4. Project root: `./relay.toml`
//! 5. Global: `~/.config/mqtt-gpt-relay/config.toml`
//! 6. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBrokerConfig, FileClassifierConfig, FileConfig,
    FileProviderConfig, FileSessionConfig, FileStorageConfig,
};
pub use loader::{ConfigLoader, ConfigOverrides};
