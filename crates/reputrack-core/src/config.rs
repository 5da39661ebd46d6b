use std::collections::HashMap;
use std::str::FromStr;

use crate::app_config::{AppConfig, Environment};
use crate::platform::{Platform, RatingScale};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
#[allow(clippy::too_many_lines)]
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        parse_value(var, &or_default(var, default))
    };
    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        parse_value(var, &or_default(var, default))
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REPUTRACK_ENV", "development"))?;

    let bind_addr = parse("REPUTRACK_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("REPUTRACK_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("REPUTRACK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REPUTRACK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REPUTRACK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let webdriver_url = or_default("REPUTRACK_WEBDRIVER_URL", "http://localhost:9515");
    let browser_headless = parse_bool(
        "REPUTRACK_BROWSER_HEADLESS",
        &or_default("REPUTRACK_BROWSER_HEADLESS", "true"),
    )?;
    let navigation_timeout_secs = parse_u64("REPUTRACK_NAVIGATION_TIMEOUT_SECS", "60")?;
    let element_timeout_ms = parse_u64("REPUTRACK_ELEMENT_TIMEOUT_MS", "5000")?;
    let selector_wait_ms = parse_u64("REPUTRACK_SELECTOR_WAIT_MS", "8000")?;
    let settle_min_ms = parse_u64("REPUTRACK_SETTLE_MIN_MS", "2000")?;
    let settle_max_ms = parse_u64("REPUTRACK_SETTLE_MAX_MS", "5000")?;
    if settle_min_ms > settle_max_ms {
        return Err(ConfigError::InvalidEnvVar {
            var: "REPUTRACK_SETTLE_MAX_MS".to_string(),
            reason: format!("must be >= REPUTRACK_SETTLE_MIN_MS ({settle_min_ms})"),
        });
    }

    let max_reviews_per_link = parse_usize("REPUTRACK_MAX_REVIEWS_PER_LINK", "10")?;
    let max_concurrent_links = parse_usize("REPUTRACK_MAX_CONCURRENT_LINKS", "2")?;
    if max_concurrent_links == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "REPUTRACK_MAX_CONCURRENT_LINKS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let session_retries = parse_u32("REPUTRACK_SESSION_RETRIES", "2")?;
    let session_retry_backoff_base_secs =
        parse_u64("REPUTRACK_SESSION_RETRY_BACKOFF_BASE_SECS", "2")?;

    let platforms = match lookup("REPUTRACK_PLATFORMS") {
        Ok(raw) => parse_platforms(&raw)?,
        Err(_) => Platform::ALL.to_vec(),
    };

    let mut rating_scales = HashMap::new();
    for platform in Platform::ALL {
        let var = format!(
            "REPUTRACK_RATING_SCALE_{}",
            platform.as_str().to_ascii_uppercase()
        );
        if let Ok(raw) = lookup(&var) {
            rating_scales.insert(platform, parse_value::<RatingScale>(&var, &raw)?);
        }
    }

    let fake_transformer_url =
        or_default("REPUTRACK_FAKE_TRANSFORMER_URL", "http://localhost:8081");
    let fake_transformer_label = or_default("REPUTRACK_FAKE_TRANSFORMER_LABEL", "LABEL_1");
    let fake_recurrent_url = or_default(
        "REPUTRACK_FAKE_RECURRENT_URL",
        "http://localhost:8501/v1/models/bilstm_fake_review:predict",
    );
    let fake_recurrent_vocab = PathBuf::from(or_default(
        "REPUTRACK_FAKE_RECURRENT_VOCAB",
        "./models/word_to_idx.json",
    ));
    let sentiment_url = or_default("REPUTRACK_SENTIMENT_URL", "http://localhost:8082");
    let classifier_timeout_secs = parse_u64("REPUTRACK_CLASSIFIER_TIMEOUT_SECS", "30")?;

    let resend_api_key = lookup("RESEND_API_KEY").ok().filter(|k| !k.trim().is_empty());
    let notify_from = or_default("REPUTRACK_NOTIFY_FROM", "RepuTrack <onboarding@resend.dev>");
    let scrape_cron = or_default("REPUTRACK_SCRAPE_CRON", "0 0 3 1,15 * *");
    let api_keys = lookup("REPUTRACK_API_KEYS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        webdriver_url,
        browser_headless,
        navigation_timeout_secs,
        element_timeout_ms,
        selector_wait_ms,
        settle_min_ms,
        settle_max_ms,
        max_reviews_per_link,
        max_concurrent_links,
        session_retries,
        session_retry_backoff_base_secs,
        platforms,
        rating_scales,
        fake_transformer_url,
        fake_transformer_label,
        fake_recurrent_url,
        fake_recurrent_vocab,
        sentiment_url,
        classifier_timeout_secs,
        resend_api_key,
        notify_from,
        scrape_cron,
        api_keys,
    })
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Parse a comma-separated platform list, dropping duplicates.
fn parse_platforms(raw: &str) -> Result<Vec<Platform>, ConfigError> {
    let mut platforms = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let platform = parse_value::<Platform>("REPUTRACK_PLATFORMS", part)?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    if platforms.is_empty() {
        return Err(ConfigError::InvalidEnvVar {
            var: "REPUTRACK_PLATFORMS".to_string(),
            reason: "no platforms listed".to_string(),
        });
    }
    Ok(platforms)
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REPUTRACK_ENV".to_string(),
            reason: format!("unknown environment {other:?}"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
