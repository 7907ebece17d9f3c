//! Location records and their coordinates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lead_score::LeadScore;
use crate::CoreError;

/// Backend-assigned identity of a persisted [`LocationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoreError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.lat, raw.lng)
    }
}

impl Coordinates {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCoordinates`] if either value is not
    /// finite or falls outside the valid latitude/longitude range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoreError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if valid {
            Ok(Self { lat, lng })
        } else {
            Err(CoreError::InvalidCoordinates { lat, lng })
        }
    }

    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// A located building annotated with its rooftop-unit detection outcome.
///
/// Records held by the record store always carry an `id`, a non-blank
/// `address` and `coordinates` (see [`LocationRecord::is_persisted`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: Option<RecordId>,
    pub building_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub coordinates: Option<Coordinates>,
    pub rtu_count: u32,
    pub lead_score: LeadScore,
    /// Backend-relative path of the annotated detection image,
    /// e.g. `"/uploads/processed/map_screenshot.png"`.
    pub processed_image: Option<String>,
    pub filename: Option<String>,
    /// Review status: `"pending"` until approved.
    pub status: String,
    pub approved: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for LocationRecord {
    fn default() -> Self {
        Self {
            id: None,
            building_name: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            coordinates: None,
            rtu_count: 0,
            lead_score: LeadScore::default(),
            processed_image: None,
            filename: None,
            status: "pending".to_string(),
            approved: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl LocationRecord {
    /// Returns `true` when the record satisfies the persisted-record
    /// invariant: identity, address and coordinates are all present.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && !self.address.trim().is_empty() && self.coordinates.is_some()
    }

    /// Sets `rtu_count` and recomputes the derived lead score.
    pub fn set_rtu_count(&mut self, rtu_count: u32) {
        self.rtu_count = rtu_count;
        self.lead_score = LeadScore::from_rtu_count(rtu_count);
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        non_blank_or(&self.building_name, "Unknown Building")
    }

    #[must_use]
    pub fn display_address(&self) -> &str {
        non_blank_or(&self.address, "Unknown Address")
    }
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_reject_out_of_range_values() {
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
        assert!(Coordinates::new(40.4406, -79.9959).is_ok());
    }

    #[test]
    fn coordinates_display_uses_six_decimals() {
        let c = Coordinates::new(40.4406, -79.9959).unwrap();
        assert_eq!(c.to_string(), "40.440600, -79.995900");
    }

    #[test]
    fn coordinates_deserialize_validates() {
        let ok: Result<Coordinates, _> = serde_json::from_str(r#"{"lat": 1.0, "lng": 2.0}"#);
        assert!(ok.is_ok());
        let bad: Result<Coordinates, _> = serde_json::from_str(r#"{"lat": 100.0, "lng": 2.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn persisted_requires_id_address_and_coordinates() {
        let mut record = LocationRecord {
            address: "123 Main St".to_string(),
            ..LocationRecord::default()
        };
        assert!(!record.is_persisted());
        record.id = Some(RecordId(1));
        assert!(!record.is_persisted());
        record.coordinates = Some(Coordinates::new(1.0, 1.0).unwrap());
        assert!(record.is_persisted());
        record.address = "  ".to_string();
        assert!(!record.is_persisted());
    }

    #[test]
    fn set_rtu_count_recomputes_lead_score() {
        let mut record = LocationRecord::default();
        record.set_rtu_count(12);
        assert_eq!(record.lead_score.label(), "Good");
    }

    #[test]
    fn display_fallbacks_for_blank_fields() {
        let record = LocationRecord::default();
        assert_eq!(record.display_name(), "Unknown Building");
        assert_eq!(record.display_address(), "Unknown Address");
    }
}
