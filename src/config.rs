use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

const MAX_EXPIRY_SECS: u64 = 365 * 24 * 60 * 60;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:8080,http://localhost:5173,https://trusted-discovery.com,https://www.trusted-discovery.com";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub dialect: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: Option<String>,
    pub use_password: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseConfig {
            dialect: var_or("DB_DIALECT", "postgres"),
            host: var_or("DB_HOST", "localhost"),
            port: parse_var(&lookup, "DB_PORT", 5433)?,
            name: var_or("DB_NAME", "hackathon"),
            user: var_or("DB_USER", "postgres"),
            password: lookup("DB_PASSWORD"),
            use_password: var_or("DB_USE_PASSWORD", "true") == "true",
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS", 20)?,
        };
        if database.dialect != "postgres" {
            bail!("unsupported DB_DIALECT {:?}; only postgres is supported", database.dialect);
        }

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            expires_in: parse_expiry(&var_or("JWT_EXPIRES_IN", "24h"))
                .context("invalid JWT_EXPIRES_IN")?,
        };

        Ok(Self {
            app_name: var_or("APP", "trusted-discovery-dev"),
            host: var_or("APP_HOST", "0.0.0.0"),
            port: parse_var(&lookup, "PORT", 3000)?,
            database,
            jwt,
            cors_origins: split_origins(&var_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parses `"3600"`, `"90s"`, `"30m"`, `"24h"` or `"7d"` into a duration.
pub fn parse_expiry(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    if digits.is_empty() {
        bail!("expiry {raw:?} has no amount");
    }
    let amount: u64 = digits.parse()?;
    let unit_secs: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => bail!("unknown expiry unit {other:?}"),
    };
    let secs = amount
        .checked_mul(unit_secs)
        .with_context(|| format!("expiry {raw:?} is out of range"))?;
    if secs == 0 {
        bail!("expiry must be positive");
    }
    if secs > MAX_EXPIRY_SECS {
        bail!("expiry {raw:?} exceeds the 365 day maximum");
    }
    Ok(Duration::from_secs(secs))
}
