//! Configuration file loading for debate-council
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COUNCIL_`-prefixed environment variables (`__` separates section and key)
//! 2. `--config <path>` specified file
//! 3. Project root: `./council.toml` or `./.council.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/debate-council/config.toml`
//! 5. Fallback: `~/.config/debate-council/config.toml`
//! 6. Default values
//!
//! CLI flags are applied on top by the binary.

mod error;
mod file_config;
mod loader;

pub use error::ConfigError;
pub use file_config::{
    FileConfig, FileCouncilConfig, FileLoggingConfig, FileModelsConfig, FileOutputConfig,
    FileOutputFormat, FileProviderConfig, FileServerConfig, FileStorageConfig, StorageBackend,
};
pub use loader::ConfigLoader;
