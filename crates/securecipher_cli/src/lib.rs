//! SecureCipher operator CLI: key issuance, verification and co-signing

pub mod commands;
pub mod config;

pub use config::AppConfig;

use std::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr `tracing` subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    // A second initialisation (e.g. in tests) is not an error worth reporting
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Accept either inline JSON or a path to a JSON file
pub fn read_json_arg(arg: &str) -> anyhow::Result<String> {
    if arg.trim_start().starts_with('{') {
        Ok(arg.to_string())
    } else {
        fs::read_to_string(arg)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", arg, e))
    }
}
