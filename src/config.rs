use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::rate_limiter::RateLimit;

/// Runtime settings, read once at start-up.
#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub typing_ttl: Duration,
    pub message_rate: RateLimit,
    pub room_rate: RateLimit,
    pub rate_sweep_interval: Duration,
    pub max_message_length: usize,
    pub notification_ttl: chrono::Duration,
    pub notification_purge_interval: Duration,
}

impl Config {
    /// Defaults for everything except the token secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            jwt_secret: jwt_secret.into(),
            heartbeat_interval: Duration::from_secs(25),
            heartbeat_timeout: Duration::from_secs(60),
            typing_ttl: Duration::from_secs(5),
            message_rate: RateLimit::new(10, Duration::from_secs(5)),
            room_rate: RateLimit::new(60, Duration::from_secs(60)),
            rate_sweep_interval: Duration::from_secs(60),
            max_message_length: 1000,
            notification_ttl: chrono::Duration::days(4),
            notification_purge_interval: Duration::from_secs(3600),
        }
    }

    pub fn from_env() -> Result<Self> {
        // a missing .env file is fine in containers
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET must be set")?;
        let defaults = Self::new(jwt_secret);

        let secs = |key: &str, default: Duration| -> Result<Duration> {
            Ok(Duration::from_secs(parse_or(&lookup, key, default.as_secs())?))
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            heartbeat_interval: secs("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval)?,
            heartbeat_timeout: secs("HEARTBEAT_TIMEOUT_SECS", defaults.heartbeat_timeout)?,
            typing_ttl: secs("TYPING_TTL_SECS", defaults.typing_ttl)?,
            message_rate: RateLimit::new(
                parse_or(&lookup, "MESSAGE_RATE_LIMIT", defaults.message_rate.max_sends)?,
                secs("MESSAGE_RATE_WINDOW_SECS", defaults.message_rate.window)?,
            ),
            room_rate: RateLimit::new(
                parse_or(&lookup, "ROOM_RATE_LIMIT", defaults.room_rate.max_sends)?,
                secs("ROOM_RATE_WINDOW_SECS", defaults.room_rate.window)?,
            ),
            rate_sweep_interval: secs("RATE_SWEEP_INTERVAL_SECS", defaults.rate_sweep_interval)?,
            max_message_length: parse_or(&lookup, "MAX_MESSAGE_LENGTH", defaults.max_message_length)?,
            notification_ttl: chrono::Duration::days(parse_or(
                &lookup,
                "NOTIFICATION_TTL_DAYS",
                defaults.notification_ttl.num_days(),
            )?),
            notification_purge_interval: secs(
                "NOTIFICATION_PURGE_INTERVAL_SECS",
                defaults.notification_purge_interval,
            )?,
            jwt_secret: defaults.jwt_secret,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
