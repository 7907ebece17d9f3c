//! Service seams the engine depends on.
//!
//! The engine only talks to the outside world through these traits so that
//! tests can swap in in-memory doubles. The HTTP clients from
//! `rtumap-geocode` and `rtumap-backend` implement them directly.

use async_trait::async_trait;
use rtumap_backend::{
    ApprovalResponse, BackendClient, DetectionError, PersistenceError, SaveUploadForm,
};
use rtumap_core::{CapturePayload, Coordinates, DetectionResult, LocationRecord, RecordId};
use rtumap_geocode::{GeocodeClient, GeocodeError, GeocodedPlace};

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<GeocodedPlace>, GeocodeError>;
    async fn forward(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

#[async_trait]
pub trait DetectionService: Send + Sync {
    async fn detect(
        &self,
        payload: &CapturePayload,
        center: Coordinates,
        address: &str,
    ) -> Result<DetectionResult, DetectionError>;
}

/// CRUD access to persisted records.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn list(&self) -> Result<Vec<LocationRecord>, PersistenceError>;
    async fn save(&self, form: &SaveUploadForm) -> Result<LocationRecord, PersistenceError>;
    async fn delete(&self, id: RecordId) -> Result<(), PersistenceError>;
    async fn approve(&self, id: RecordId) -> Result<ApprovalResponse, PersistenceError>;
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn reverse(&self, coords: Coordinates) -> Result<Option<GeocodedPlace>, GeocodeError> {
        self.reverse_geocode(coords).await
    }

    async fn forward(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        self.forward_geocode(query).await
    }
}

#[async_trait]
impl DetectionService for BackendClient {
    async fn detect(
        &self,
        payload: &CapturePayload,
        center: Coordinates,
        address: &str,
    ) -> Result<DetectionResult, DetectionError> {
        BackendClient::detect(self, payload, center, address).await
    }
}

#[async_trait]
impl RecordBackend for BackendClient {
    async fn list(&self) -> Result<Vec<LocationRecord>, PersistenceError> {
        self.history().await
    }

    async fn save(&self, form: &SaveUploadForm) -> Result<LocationRecord, PersistenceError> {
        self.save_upload(form).await
    }

    async fn delete(&self, id: RecordId) -> Result<(), PersistenceError> {
        BackendClient::delete(self, id).await
    }

    async fn approve(&self, id: RecordId) -> Result<ApprovalResponse, PersistenceError> {
        BackendClient::approve(self, id).await
    }
}
