use crate::app_config::{AppConfig, CaptureMode, Environment, IdentityMode, MergePolicy};
use crate::ConfigError;

/// Desktop Chrome user agent; the site serves a reduced page to unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ja,en-US;q=0.7,en;q=0.3";

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
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
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

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("SLOTDATA_ENV", "development"))?;
    let log_level = or_default("SLOTDATA_LOG_LEVEL", "info");
    let site_profile_path = PathBuf::from(or_default(
        "SLOTDATA_SITE_PROFILE_PATH",
        "./config/site.yaml",
    ));

    let db_max_connections = parse_u32("SLOTDATA_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SLOTDATA_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SLOTDATA_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let capture_mode = parse_capture_mode(&or_default("SLOTDATA_CAPTURE_MODE", "interactive"))?;
    let browser_headless = parse_bool("SLOTDATA_BROWSER_HEADLESS", "true")?;
    let request_timeout_secs = parse_u64("SLOTDATA_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("SLOTDATA_USER_AGENT", DEFAULT_USER_AGENT);
    let accept_language = or_default("SLOTDATA_ACCEPT_LANGUAGE", DEFAULT_ACCEPT_LANGUAGE);

    let max_concurrent_stores = parse_usize("SLOTDATA_MAX_CONCURRENT_STORES", "4")?;
    let max_retries = parse_u32("SLOTDATA_MAX_RETRIES", "2")?;
    let retry_backoff_base_secs = parse_u64("SLOTDATA_RETRY_BACKOFF_BASE_SECS", "60")?;
    let session_timeout_secs = parse_u64("SLOTDATA_SESSION_TIMEOUT_SECS", "3600")?;
    let upsert_batch_size = parse_usize("SLOTDATA_UPSERT_BATCH_SIZE", "1000")?;
    if upsert_batch_size == 0 {
        return Err(invalid(
            "SLOTDATA_UPSERT_BATCH_SIZE",
            "must be at least 1".to_string(),
        ));
    }

    let polite_delay_min_ms = parse_u64("SLOTDATA_POLITE_DELAY_MIN_MS", "500")?;
    let polite_delay_max_ms = parse_u64("SLOTDATA_POLITE_DELAY_MAX_MS", "2000")?;
    if polite_delay_max_ms < polite_delay_min_ms {
        return Err(invalid(
            "SLOTDATA_POLITE_DELAY_MAX_MS",
            format!("must be >= SLOTDATA_POLITE_DELAY_MIN_MS ({polite_delay_min_ms})"),
        ));
    }

    let max_tab_clicks = parse_usize("SLOTDATA_MAX_TAB_CLICKS", "6")?;
    let json_body_limit_bytes = parse_usize("SLOTDATA_JSON_BODY_LIMIT_BYTES", "5000000")?;
    let identity_mode = parse_identity_mode(&or_default("SLOTDATA_IDENTITY_MODE", "run_scoped"))?;
    let merge_policy = parse_merge_policy(&or_default("SLOTDATA_MERGE_POLICY", "auto"))?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        site_profile_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        capture_mode,
        browser_headless,
        request_timeout_secs,
        user_agent,
        accept_language,
        max_concurrent_stores,
        max_retries,
        retry_backoff_base_secs,
        session_timeout_secs,
        upsert_batch_size,
        polite_delay_min_ms,
        polite_delay_max_ms,
        max_tab_clicks,
        json_body_limit_bytes,
        identity_mode,
        merge_policy,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTDATA_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

fn parse_capture_mode(s: &str) -> Result<CaptureMode, ConfigError> {
    match s {
        "static" => Ok(CaptureMode::Static),
        "interactive" => Ok(CaptureMode::Interactive),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTDATA_CAPTURE_MODE".to_string(),
            reason: format!("expected static or interactive; got '{other}'"),
        }),
    }
}

fn parse_identity_mode(s: &str) -> Result<IdentityMode, ConfigError> {
    match s {
        "run_scoped" => Ok(IdentityMode::RunScoped),
        "stable" => Ok(IdentityMode::Stable),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTDATA_IDENTITY_MODE".to_string(),
            reason: format!("expected run_scoped or stable; got '{other}'"),
        }),
    }
}

fn parse_merge_policy(s: &str) -> Result<MergePolicy, ConfigError> {
    match s {
        "auto" => Ok(MergePolicy::Auto),
        "first_match" => Ok(MergePolicy::FirstMatch),
        "union_all" => Ok(MergePolicy::UnionAll),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTDATA_MERGE_POLICY".to_string(),
            reason: format!("expected auto, first_match, or union_all; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
