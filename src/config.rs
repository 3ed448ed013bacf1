//! Process configuration, read from environment variables (and `.env` via dotenvy)

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::sandbox::SandboxConfig;

/// Worker/gateway configuration
#[derive(Debug, Clone)]
pub struct JudgerConfig {
    pub redis_url: String,
    /// Language table file; the built-in table is used when unset
    pub languages_config: Option<PathBuf>,
    pub gateway_addr: String,
    pub sandbox: SandboxConfig,
}

impl JudgerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            languages_config: std::env::var("LANGUAGES_CONFIG").ok().map(PathBuf::from),
            gateway_addr: env_or("GATEWAY_ADDR", "0.0.0.0:8000"),
            sandbox: SandboxConfig::from_env()?,
        })
    }
}

/// Read a variable, falling back to `default` when unset
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse a variable, falling back to `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        Err(_) => Ok(default),
    }
}
