use std::{env, fmt::Display, ops::RangeInclusive, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "footprint-ledger-dev-secret";
const TOKEN_TTL_HOURS: RangeInclusive<i64> = 1..=8760;
const BCRYPT_COSTS: RangeInclusive<u32> = 4..=31;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        Ok(Self {
            port: try_load(&lookup, "PORT", "8080")?,
            data_path: try_load(&lookup, "APP_DATA_PATH", "data/state.json")?,
            jwt_secret,
            token_ttl_hours: in_range(
                "TOKEN_TTL_HOURS",
                try_load(&lookup, "TOKEN_TTL_HOURS", "24")?,
                TOKEN_TTL_HOURS,
            )?,
            bcrypt_cost: in_range(
                "BCRYPT_COST",
                try_load(&lookup, "BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
                BCRYPT_COSTS,
            )?,
        })
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.clone(),
        reason: e.to_string(),
    })
}

fn in_range<T: PartialOrd + Display>(
    key: &'static str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("expected {}..={}", range.start(), range.end()),
        })
    }
}
