use crate::time_utils::{normalize_timezone, EngineTimezone};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Tunables of the engine itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub recommendation_limit: usize,
    pub score_window_days: u32,
    pub consistency_bonus_max: f64,
    pub mood_entry_points: u32,
    /// How many days before "today" an activity may still be dated.
    pub backdate_grace_days: u32,
    pub storage_timeout: Duration,
    pub timezone: EngineTimezone,
    pub timezone_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recommendation_limit: 4,
            score_window_days: 30,
            consistency_bonus_max: 10.0,
            mood_entry_points: 5,
            backdate_grace_days: 1,
            storage_timeout: Duration::from_millis(5000),
            timezone: EngineTimezone::utc(),
            timezone_name: "UTC".to_string(),
        }
    }
}

/// Settings only the HTTP binary needs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let recommendation_limit = parse_or(&lookup, "RECOMMENDATION_LIMIT", defaults.recommendation_limit)?;
        let score_window_days = parse_or(&lookup, "SCORE_WINDOW_DAYS", defaults.score_window_days)?;
        if score_window_days == 0 {
            return Err(anyhow!("SCORE_WINDOW_DAYS must be at least 1"));
        }
        let consistency_bonus_max = parse_or(&lookup, "CONSISTENCY_BONUS_MAX", defaults.consistency_bonus_max)?;
        if !(0.0..=100.0).contains(&consistency_bonus_max) {
            return Err(anyhow!("CONSISTENCY_BONUS_MAX must be between 0 and 100"));
        }
        let mood_entry_points = parse_or(&lookup, "MOOD_ENTRY_POINTS", defaults.mood_entry_points)?;
        let backdate_grace_days = parse_or(&lookup, "BACKDATE_GRACE_DAYS", defaults.backdate_grace_days)?;
        let timeout_ms: u64 = parse_or(&lookup, "STORAGE_TIMEOUT_MS", 5000)?;

        let raw_tz = lookup("ENGINE_TIMEZONE").unwrap_or_else(|| defaults.timezone_name.clone());
        let timezone_name =
            normalize_timezone(&raw_tz).ok_or_else(|| anyhow!("ENGINE_TIMEZONE '{raw_tz}' is not a known timezone"))?;
        let timezone = EngineTimezone::parse(&timezone_name)
            .ok_or_else(|| anyhow!("ENGINE_TIMEZONE '{raw_tz}' is not a known timezone"))?;

        Ok(Self {
            recommendation_limit,
            score_window_days,
            consistency_bonus_max,
            mood_entry_points,
            backdate_grace_days,
            storage_timeout: Duration::from_millis(timeout_ms.max(1)),
            timezone,
            timezone_name,
        })
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| {
            let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });
        Self {
            database_url,
            bind_addr,
        }
    }
}
