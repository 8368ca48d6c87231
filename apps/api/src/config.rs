use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_TEMPLATE_PATH: &str = "application_letter_templates/template_001.docx";

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub template_path: PathBuf,
    pub db_max_connections: u32,
    pub download_rate_limit_max: u32,
    pub download_rate_limit_window: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let download_rate_limit_max = parse_env("DOWNLOAD_RATE_LIMIT_MAX", 30)?;
        let download_rate_limit_window =
            Duration::from_secs(parse_env("DOWNLOAD_RATE_LIMIT_WINDOW_SECS", 60)?);
        check_rate_limit(download_rate_limit_max, download_rate_limit_window)?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            template_path: std::env::var("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TEMPLATE_PATH)),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            download_rate_limit_max,
            download_rate_limit_window,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// A zero limit would reject every download and a zero window would never
/// limit anything (and cannot drive the sweeper interval).
fn check_rate_limit(max_requests: u32, window: Duration) -> Result<()> {
    if max_requests == 0 {
        bail!("DOWNLOAD_RATE_LIMIT_MAX must be at least 1");
    }
    if window.is_zero() {
        bail!("DOWNLOAD_RATE_LIMIT_WINDOW_SECS must be at least 1");
    }
    Ok(())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_accepts_positive_values() {
        assert!(check_rate_limit(30, Duration::from_secs(60)).is_ok());
        assert!(check_rate_limit(1, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_rate_limit_rejects_zero_window() {
        let err = check_rate_limit(30, Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("DOWNLOAD_RATE_LIMIT_WINDOW_SECS"));
    }

    #[test]
    fn test_rate_limit_rejects_zero_max() {
        let err = check_rate_limit(0, Duration::from_secs(60)).unwrap_err();
        assert!(err.to_string().contains("DOWNLOAD_RATE_LIMIT_MAX"));
    }
}
