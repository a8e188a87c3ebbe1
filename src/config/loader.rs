//! Configuration loading from disk and the process environment.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", ErrorList(.0))]
    Validation(Vec<ValidationError>),
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::Validation(vec![err])
    }
}

struct ErrorList<'a>(&'a [ValidationError]);

impl fmt::Display for ErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
///
/// Without a file the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Deserialize a TOML document. Missing sections take their defaults.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply the deployment-level overrides.
///
/// | Variable              | Field                     |
/// |-----------------------|---------------------------|
/// | `LISTEN_ADDR`         | `listener.bind_address`   |
/// | `USERS_SERVICE_URL`   | url of upstream `users`   |
/// | `ORDERS_SERVICE_URL`  | url of upstream `orders`  |
/// | `JWT_SECRET`          | `auth.jwt_secret`         |
///
/// Empty values are ignored. An upstream override for a name the config
/// does not declare adds that upstream.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(addr) = get("LISTEN_ADDR") {
        config.listener.bind_address = addr;
    }
    if let Some(secret) = get("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }

    for (key, name) in [("USERS_SERVICE_URL", "users"), ("ORDERS_SERVICE_URL", "orders")] {
        let Some(url) = get(key) else { continue };
        match config.upstream_mut(name) {
            Some(upstream) => upstream.url = url,
            None => config.upstreams.push(crate::config::schema::UpstreamConfig {
                name: name.to_string(),
                url,
            }),
        }
    }
}
