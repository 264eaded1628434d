use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which persistence backend the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub frontend_origin: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" | "mongodb" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let mongo_uri = env::var("MONGO_URI").ok();
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            store_backend,
            mongo_uri,
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "ticket_tracker".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_hours: within(
                "JWT_TTL_HOURS",
                parse_or("JWT_TTL_HOURS", 24)?,
                MIN_TTL_HOURS..=MAX_TTL_HOURS,
            )?,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

/// Tokens live between one hour and one year.
const MIN_TTL_HOURS: i64 = 1;
const MAX_TTL_HOURS: i64 = 24 * 366;

fn within<T>(name: &'static str, value: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { name, value: value.to_string() })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            store_backend: StoreBackend::Memory,
            mongo_uri: None,
            database_name: "ticket_tracker_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_ttl_hours: 1,
            frontend_origin: "http://localhost:3000".to_string(),
            upload_dir,
            max_upload_bytes: 1024 * 1024,
            bcrypt_cost: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: i64 = parse_or("TICKET_TRACKER_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn token_lifetime_is_bounded() {
        let range = MIN_TTL_HOURS..=MAX_TTL_HOURS;
        assert_eq!(within("JWT_TTL_HOURS", 24, range.clone()).unwrap(), 24);
        assert!(matches!(
            within("JWT_TTL_HOURS", 0, range.clone()),
            Err(ConfigError::Invalid { name: "JWT_TTL_HOURS", .. })
        ));
        assert!(matches!(
            within("JWT_TTL_HOURS", i64::MAX, range),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
