// Configuration management module
// TOML settings for the embedding provider, installer and connection pool

pub mod settings;

pub use settings::{
    Config, ConfigError, DatabaseConfig, EmbeddingConfig, EmbeddingProviderKind, InstallerConfig,
    OllamaConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
