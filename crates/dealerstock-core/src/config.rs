use std::net::SocketAddr;
use std::path::PathBuf;

use crate::app_config::{ApiCredentials, AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are present but invalid.
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
/// Returns `ConfigError` if values are present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("DEALERSTOCK_ENV", "development"))?;

    let bind_addr = or_default("DEALERSTOCK_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("DEALERSTOCK_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("DEALERSTOCK_LOG_LEVEL", "info");
    let dealer_path = PathBuf::from(or_default(
        "DEALERSTOCK_DEALER_PATH",
        "./config/dealer.yaml",
    ));

    let request_timeout_secs = parse_u64("DEALERSTOCK_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default(
        "DEALERSTOCK_USER_AGENT",
        "dealerstock/0.1 (vehicle-inventory)",
    );
    let max_retries = parse_u32("DEALERSTOCK_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_u64("DEALERSTOCK_RETRY_BACKOFF_BASE_MS", "500")?;

    let cache_ttl_secs = parse_u64("DEALERSTOCK_CACHE_TTL_SECS", "3600")?;
    let detail_cache_ttl_secs = parse_u64("DEALERSTOCK_DETAIL_CACHE_TTL_SECS", "3600")?;
    let dedup_prefix_len = parse_usize("DEALERSTOCK_DEDUP_PREFIX_LEN", "30")?;
    if dedup_prefix_len == 0 {
        return Err(invalid(
            "DEALERSTOCK_DEDUP_PREFIX_LEN",
            "must be greater than zero".to_string(),
        ));
    }
    let source_budget_secs = parse_u64("DEALERSTOCK_SOURCE_BUDGET_SECS", "60")?;

    let render_nav_timeout_ms = parse_u64("DEALERSTOCK_RENDER_NAV_TIMEOUT_MS", "30000")?;
    let render_settle_ms = parse_u64("DEALERSTOCK_RENDER_SETTLE_MS", "5000")?;
    let render_max_sessions = parse_usize("DEALERSTOCK_RENDER_MAX_SESSIONS", "2")?.max(1);
    let chromium_path = optional("DEALERSTOCK_CHROMIUM_PATH").map(PathBuf::from);

    let api_credentials = match (
        optional("DEALERSTOCK_API_USERNAME"),
        optional("DEALERSTOCK_API_PASSWORD"),
    ) {
        (Some(username), Some(password)) => Some(ApiCredentials { username, password }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(ConfigError::MissingEnvVar(
                "DEALERSTOCK_API_PASSWORD".to_string(),
            ))
        }
        (None, Some(_)) => {
            return Err(ConfigError::MissingEnvVar(
                "DEALERSTOCK_API_USERNAME".to_string(),
            ))
        }
    };

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        dealer_path,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        cache_ttl_secs,
        detail_cache_ttl_secs,
        dedup_prefix_len,
        source_budget_secs,
        render_nav_timeout_ms,
        render_settle_ms,
        render_max_sessions,
        chromium_path,
        api_credentials,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DEALERSTOCK_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
