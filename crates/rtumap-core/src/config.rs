use crate::app_config::{AppConfig, Environment};
use crate::records::Coordinates;
use crate::ConfigError;

pub const DEFAULT_GEOCODE_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Only commands that talk to the geocoding provider need this variable.
pub const GEOCODE_API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid.
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
/// Returns `ConfigError` if a value is invalid.
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
    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let geocode_api_key = optional(GEOCODE_API_KEY_VAR);

    let env = parse_environment(&or_default("RTUMAP_ENV", "development"))?;
    let log_level = or_default("RTUMAP_LOG_LEVEL", "info");
    let api_base_url = or_default("RTUMAP_API_BASE_URL", "http://localhost:8000");
    let geocode_base_url = or_default("RTUMAP_GEOCODE_BASE_URL", DEFAULT_GEOCODE_BASE_URL);
    let request_timeout_secs = parse_u64("RTUMAP_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("RTUMAP_USER_AGENT", "rtumap/0.1 (rtu-detection)");
    let geocode_max_concurrent = or_default("RTUMAP_GEOCODE_MAX_CONCURRENT", "4")
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidEnvVar {
            var: "RTUMAP_GEOCODE_MAX_CONCURRENT".to_string(),
            reason: "expected a positive integer".to_string(),
        })?;

    let capture_scale = parse_capture_scale(&or_default("RTUMAP_CAPTURE_SCALE", "2.0"))?;

    let lat = parse_num("RTUMAP_DEFAULT_LAT", "40.4406")?;
    let lng = parse_num("RTUMAP_DEFAULT_LNG", "-79.9959")?;
    let default_center = Coordinates::new(lat, lng).map_err(|e| ConfigError::InvalidEnvVar {
        var: "RTUMAP_DEFAULT_LAT/RTUMAP_DEFAULT_LNG".to_string(),
        reason: e.to_string(),
    })?;

    let default_zoom = or_default("RTUMAP_DEFAULT_ZOOM", "16")
        .parse::<u8>()
        .ok()
        .filter(|z| *z <= 22)
        .ok_or_else(|| ConfigError::InvalidEnvVar {
            var: "RTUMAP_DEFAULT_ZOOM".to_string(),
            reason: "expected an integer zoom level between 0 and 22".to_string(),
        })?;

    Ok(AppConfig {
        env,
        log_level,
        api_base_url,
        geocode_api_key,
        geocode_base_url,
        geocode_max_concurrent,
        request_timeout_secs,
        user_agent,
        capture_scale,
        default_center,
        default_zoom,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "RTUMAP_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

/// Capture scale must be a finite value of at least 2.0; detection quality
/// degrades sharply on 1x renders.
fn parse_capture_scale(raw: &str) -> Result<f32, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar {
        var: "RTUMAP_CAPTURE_SCALE".to_string(),
        reason,
    };
    let scale = raw.parse::<f32>().map_err(|e| invalid(e.to_string()))?;
    if !scale.is_finite() || scale < 2.0 {
        return Err(invalid(format!("{raw} is below the minimum scale of 2.0")));
    }
    Ok(scale)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
