//! Backend wire types.
//!
//! The backend speaks snake_case JSON. Numeric fields on history records
//! have been seen both as numbers and as strings, so they are captured as raw
//! [`serde_json::Value`] and resolved in [`crate::normalize`].

use rtumap_core::{Coordinates, LocationRecord};
use serde::{Deserialize, Serialize};

/// A record as returned by `GET /history` and `POST /save_upload`.
#[derive(Debug, Deserialize)]
pub struct WireRecord {
    pub id: i64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub processed_image: Option<String>,
    #[serde(default)]
    pub rtu_count: Option<serde_json::Value>,
    #[serde(default)]
    pub lead_score: Option<serde_json::Value>,
    #[serde(default)]
    pub building_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub lat: Option<serde_json::Value>,
    #[serde(default)]
    pub lng: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub rtu_count: u32,
    #[serde(default)]
    pub detections: Vec<WireDetection>,
    #[serde(default)]
    pub processed_image: Option<String>,
    /// Provider score on a 0–1 scale; frequently omitted.
    #[serde(default)]
    pub lead_score: Option<f64>,
}

/// One detection as reported by the service: either a point (`x`, `y`) or
/// an `[x1, y1, x2, y2]` box, or both.
#[derive(Debug, Deserialize)]
pub struct WireDetection {
    pub confidence: f64,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    #[serde(default, alias = "class")]
    pub class_name: Option<String>,
}

/// Multipart fields for `POST /save_upload`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveUploadForm {
    pub building_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub processed_image: String,
    pub rtu_count: u32,
    pub coordinates: Option<Coordinates>,
}

impl SaveUploadForm {
    #[must_use]
    pub fn from_record(record: &LocationRecord) -> Self {
        Self {
            building_name: record.building_name.clone(),
            address: record.address.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            zip_code: record.zip_code.clone(),
            processed_image: record.processed_image.clone().unwrap_or_default(),
            rtu_count: record.rtu_count,
            coordinates: record.coordinates,
        }
    }
}

/// Body of `POST /approve/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub id: i64,
    pub approved: bool,
    pub message: String,
}

/// Body of `GET /analytics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_images: i64,
    pub total_rtu_count: i64,
    /// Percentage of uploads with at least one detected unit.
    pub success_rate: f64,
    pub avg_lead_score: f64,
    pub failed_detections: i64,
    pub total_buildings: i64,
}
