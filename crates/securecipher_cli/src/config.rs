//! Configuration management for the SecureCipher CLI

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Transaction and user database
    pub store: StoreConfig,
    /// Server co-signing identity
    pub server_key: ServerKeyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the fjall keyspace
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerKeyConfig {
    /// PKCS#8 PEM written by `securecipher keygen`
    pub private_key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("data/securecipher"),
            },
            server_key: ServerKeyConfig {
                private_key_path: PathBuf::from("keys/server_private.pem"),
            },
            logging: LoggingConfig {
                filter: "securecipher=info,securecipher_cli=info,securecipher_core=info,securecipher_store=info".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from file, on top of the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from default locations.
    ///
    /// Defaults, then `config/securecipher.toml` if present, then
    /// `SECURECIPHER_*` environment variables (`SECURECIPHER_STORE__PATH`).
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::with_name("config/securecipher").required(false))
            .add_source(
                config::Environment::with_prefix("SECURECIPHER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("store.path", defaults.store.path.to_string_lossy().into_owned())?
            .set_default(
                "server_key.private_key_path",
                defaults.server_key.private_key_path.to_string_lossy().into_owned(),
            )?
            .set_default("logging.filter", defaults.logging.filter)
    }
}
