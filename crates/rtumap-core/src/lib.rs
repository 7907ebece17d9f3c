pub mod app_config;
pub mod config;
pub mod detection;
pub mod lead_score;
pub mod records;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use detection::{CapturePayload, Detection, DetectionResult, PROVIDER_NEUTRAL_SCORE};
pub use lead_score::{LeadScore, LeadTier, MAX_LEAD_SCORE};
pub use records::{Coordinates, LocationRecord, RecordId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid coordinates ({lat}, {lng}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinates { lat: f64, lng: f64 },
}
