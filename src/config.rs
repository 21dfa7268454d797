use std::time::Duration;

use anyhow::{bail, Context};

const DEFAULT_EXPIRES_IN: &str = "7d";
/// Ten years.
const MAX_TTL_SECS: u64 = 3650 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let expires_in =
            std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| DEFAULT_EXPIRES_IN.into());
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "schoolblog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "schoolblog-users".into()),
            ttl: parse_ttl(&expires_in)
                .with_context(|| format!("invalid JWT_EXPIRES_IN {expires_in:?}"))?,
        };

        let max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v.parse().context("invalid DB_MAX_CONNECTIONS")?,
            Err(_) => 10,
        };
        let port = match std::env::var("APP_PORT") {
            Ok(v) => v.parse().context("invalid APP_PORT")?,
            Err(_) => 4000,
        };

        Ok(Self {
            database_url,
            max_connections,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            jwt,
        })
    }
}

/// Parses a token lifetime such as `3600`, `90s`, `30m`, `12h` or `7d`.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    if digits.is_empty() {
        bail!("missing amount");
    }
    let amount: u64 = digits.parse().context("amount out of range")?;
    let multiplier = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => bail!("unknown unit {other:?}"),
    };
    let secs = amount
        .checked_mul(multiplier)
        .context("amount out of range")?;
    if secs == 0 {
        bail!("lifetime must be positive");
    }
    if secs > MAX_TTL_SECS {
        bail!("lifetime exceeds {MAX_TTL_SECS}s");
    }
    Ok(Duration::from_secs(secs))
}
