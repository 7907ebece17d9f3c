use crate::config::GEOCODE_API_KEY_VAR;
use crate::records::Coordinates;
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Base URL of the detection + persistence backend.
    pub api_base_url: String,
    /// Absent when `GOOGLE_MAPS_API_KEY` is unset or blank.
    pub geocode_api_key: Option<String>,
    pub geocode_base_url: String,
    /// Upper bound on in-flight geocoding requests during record refresh.
    pub geocode_max_concurrent: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Device pixel ratio used when rendering the viewport for detection.
    pub capture_scale: f32,
    pub default_center: Coordinates,
    pub default_zoom: u8,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("api_base_url", &self.api_base_url)
            .field(
                "geocode_api_key",
                &self.geocode_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("geocode_base_url", &self.geocode_base_url)
            .field("geocode_max_concurrent", &self.geocode_max_concurrent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("capture_scale", &self.capture_scale)
            .field("default_center", &self.default_center)
            .field("default_zoom", &self.default_zoom)
            .finish()
    }
}

impl AppConfig {
    /// The geocoding API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when no key was configured.
    pub fn require_geocode_api_key(&self) -> Result<&str, ConfigError> {
        self.geocode_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar(GEOCODE_API_KEY_VAR.to_string()))
    }
}
