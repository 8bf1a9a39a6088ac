use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    pub bcrypt_cost: u32,
}

impl Config {
    /// Reads `DEVMATCH_*` environment variables, falling back to defaults for unset ones.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("DEVMATCH_PORT", "3000")?,
            db_path: try_load("DEVMATCH_DB_PATH", "devmatch.sled")?,
            bcrypt_cost: try_load("DEVMATCH_BCRYPT_COST", "10")?,
        })
    }

    /// A port passed as the first command line argument wins over the environment.
    pub fn with_args(mut self, mut args: impl Iterator<Item = String>) -> Result<Self, ConfigError> {
        if let Some(p) = args.nth(1) {
            self.port = parse("port argument", &p)?;
        }
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            db_path: String::from("devmatch.sled"),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse(key, &value)
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
