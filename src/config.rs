use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    /// Upper bound for a single storage round-trip.
    pub store_timeout: Duration,
    /// Allowed CORS origins; empty means permissive.
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "book-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "book-tracker-users".into()),
            ttl_minutes: checked_ttl(env_parse("JWT_TTL_MINUTES").unwrap_or(60 * 24))?,
        };
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_default();
        Ok(Self {
            database_url,
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            store_timeout: Duration::from_millis(env_parse("STORE_TIMEOUT_MS").unwrap_or(5_000)),
            cors_origins,
        })
    }
}

/// Longest accepted token lifetime: one year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn checked_ttl(minutes: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_skips_blanks() {
        let origins = parse_origins("http://localhost:3000, ,http://localhost:5001 ");
        assert_eq!(
            origins,
            vec!["http://localhost:3000".to_string(), "http://localhost:5001".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn ttl_outside_range_is_rejected() {
        assert_eq!(checked_ttl(60).unwrap(), 60);
        assert_eq!(checked_ttl(MAX_TTL_MINUTES).unwrap(), MAX_TTL_MINUTES);
        assert!(checked_ttl(0).is_err());
        assert!(checked_ttl(-5).is_err());
        assert!(checked_ttl(i64::MAX).is_err());
    }
}
