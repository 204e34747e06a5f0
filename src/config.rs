//! Application configuration.
//!
//! Either deserialize a [`Config`] with serde from whatever source the
//! binary prefers, or read it from the process environment:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `APP_DEBUG` | debug error envelopes | `false` |
//! | `CORS_ALLOWED_ORIGINS` | comma-separated origins, `*` for any | `*` |
//! | `CORS_ALLOWED_METHODS` | comma-separated methods | `GET,POST,PUT,DELETE,OPTIONS` |
//! | `CORS_ALLOWED_HEADERS` | comma-separated headers | `Content-Type,Authorization,Accept` |
//! | `CORS_EXPOSED_HEADERS` | comma-separated headers | empty |
//! | `CORS_MAX_AGE` | seconds | `86400` |
//! | `CORS_ALLOW_CREDENTIALS` | boolean | `false` |
//!
//! CORS is only enabled when at least one `CORS_*` variable is set.

use serde::Deserialize;

use crate::cors::CorsConfig;
use crate::error::Error;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Adds traces and causes to error envelopes and keeps the message of
    /// untyped failures. Never enable in production.
    pub debug: bool,
    pub cors: Option<CorsConfig>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug = lookup("APP_DEBUG").map(|v| parse_bool("APP_DEBUG", &v)).transpose()?.unwrap_or(false);

        let keys = [
            "CORS_ALLOWED_ORIGINS",
            "CORS_ALLOWED_METHODS",
            "CORS_ALLOWED_HEADERS",
            "CORS_EXPOSED_HEADERS",
            "CORS_MAX_AGE",
            "CORS_ALLOW_CREDENTIALS",
        ];
        if keys.iter().all(|key| lookup(key).is_none()) {
            return Ok(Self { debug, cors: None });
        }

        let mut cors = CorsConfig::default();
        if let Some(v) = lookup("CORS_ALLOWED_ORIGINS") {
            cors.allowed_origins = split_list(&v);
        }
        if let Some(v) = lookup("CORS_ALLOWED_METHODS") {
            cors.allowed_methods = split_list(&v);
        }
        if let Some(v) = lookup("CORS_ALLOWED_HEADERS") {
            cors.allowed_headers = split_list(&v);
        }
        if let Some(v) = lookup("CORS_EXPOSED_HEADERS") {
            cors.exposed_headers = split_list(&v);
        }
        if let Some(v) = lookup("CORS_MAX_AGE") {
            cors.max_age = v
                .trim()
                .parse()
                .map_err(|e| Error::parse(format!("CORS_MAX_AGE must be a number of seconds, got `{v}`")).with_source(e))?;
        }
        if let Some(v) = lookup("CORS_ALLOW_CREDENTIALS") {
            cors.allow_credentials = parse_bool("CORS_ALLOW_CREDENTIALS", &v)?;
        }
        Ok(Self { debug, cors: Some(cors) })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::parse(format!("{key} must be a boolean, got `{other}`"))),
    }
}
