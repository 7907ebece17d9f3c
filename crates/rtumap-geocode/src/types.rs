//! Geocoding provider response types.
//!
//! The provider wraps every answer in `{"status": "...", "results": [...]}`.
//! Only the first result is used; its address components are reduced to the
//! city/state/zip triple the location form needs.

use rtumap_core::Coordinates;
use serde::{Deserialize, Serialize};

/// Top-level envelope of a geocoding response.
///
/// `results` is kept as raw JSON so that a malformed first result can be
/// reported with its own context instead of failing the whole envelope.
#[derive(Debug, Deserialize)]
pub struct GeocodeEnvelope {
    pub status: String,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One provider result. `address_components` is mandatory: a result without
/// it is treated as a malformed response.
#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub address_components: Vec<AddressComponent>,
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Address data extracted from the first provider result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub formatted_address: String,
    /// Long name of the `locality` component, empty when absent.
    pub city: String,
    /// Short name of the `administrative_area_level_1` component (e.g. `"PA"`).
    pub state: String,
    /// Long name of the `postal_code` component.
    pub zip: String,
    pub place_id: String,
    pub types: Vec<String>,
    /// Result geometry; `None` when the provider omitted it or it was out of range.
    pub location: Option<Coordinates>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
    }

    #[must_use]
    pub fn into_place(self) -> GeocodedPlace {
        let city = self
            .component("locality")
            .map(|c| c.long_name.clone())
            .unwrap_or_default();
        let state = self
            .component("administrative_area_level_1")
            .map(|c| c.short_name.clone())
            .unwrap_or_default();
        let zip = self
            .component("postal_code")
            .map(|c| c.long_name.clone())
            .unwrap_or_default();
        let location = self
            .geometry
            .as_ref()
            .and_then(|g| Coordinates::new(g.location.lat, g.location.lng).ok());

        GeocodedPlace {
            formatted_address: self.formatted_address,
            city,
            state,
            zip,
            place_id: self.place_id,
            types: self.types,
            location,
        }
    }
}
