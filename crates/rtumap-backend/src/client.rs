//! HTTP client for the detection and persistence backend.
//!
//! One client covers both roles because they share a host: `POST /upload`
//! runs the detection model, the remaining endpoints are plain CRUD over
//! saved records. Nothing here retries; every failure is returned to the
//! caller as a typed error.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use rtumap_core::{CapturePayload, Coordinates, DetectionResult, LocationRecord, RecordId};

use crate::error::{BackendError, DetectionError, PersistenceError};
use crate::normalize::{normalize_record, normalize_upload, parse_error_body};
use crate::types::{Analytics, ApprovalResponse, SaveUploadForm, WireRecord};

/// Client for the backend REST API.
pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`BackendError::InvalidBaseUrl`] if
    /// `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| BackendError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Builds `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetches every saved record, in backend order.
    ///
    /// Entries that do not parse are skipped with a warning rather than
    /// failing the whole listing.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::Http`] on network failure.
    /// - [`PersistenceError::Rejected`] on a non-2xx status.
    /// - [`PersistenceError::Deserialize`] if the body is not a JSON array.
    pub async fn history(&self) -> Result<Vec<LocationRecord>, PersistenceError> {
        let url = self.endpoint(&["history"]);
        tracing::debug!(%url, "fetching record history");
        let response = self.client.get(url).send().await?;
        let body = Self::persistence_body(response, "history").await?;

        let items: Vec<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| PersistenceError::Deserialize {
                context: "GET /history".to_string(),
                source: e,
            })?;

        let records = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<WireRecord>(item) {
                Ok(wire) => Some(normalize_record(wire)),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unparseable history record");
                    None
                }
            })
            .collect();

        Ok(records)
    }

    /// Submits a viewport capture to the detection service.
    ///
    /// # Errors
    ///
    /// - [`DetectionError::Http`] on network failure.
    /// - [`DetectionError::Rejected`] on a non-2xx status.
    /// - [`DetectionError::Malformed`] if the body is not a detection result.
    pub async fn detect(
        &self,
        payload: &CapturePayload,
        center: Coordinates,
        address: &str,
    ) -> Result<DetectionResult, DetectionError> {
        let file = Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(&payload.mime_type)?;
        let form = Form::new()
            .part("file", file)
            .text("latitude", center.lat().to_string())
            .text("longitude", center.lng().to_string())
            .text("address", address.to_string());

        let url = self.endpoint(&["upload"]);
        tracing::debug!(%url, bytes = payload.bytes.len(), "submitting capture for detection");
        let response = self.client.post(url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DetectionError::Rejected {
                status: status.as_u16(),
                message: parse_error_body(&body).message,
            });
        }

        normalize_upload(&body)
    }

    /// Persists a located record and returns the backend's copy.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::FieldValidation`] when the backend rejects
    ///   individual fields (HTTP 422 with a `detail` list).
    /// - [`PersistenceError::Rejected`] on any other non-2xx status.
    /// - [`PersistenceError::Http`] on network failure.
    /// - [`PersistenceError::Deserialize`] if the body is not a record.
    pub async fn save_upload(
        &self,
        form: &SaveUploadForm,
    ) -> Result<LocationRecord, PersistenceError> {
        let mut multipart = Form::new()
            .text("building_name", form.building_name.clone())
            .text("address", form.address.clone())
            .text("city", form.city.clone())
            .text("state", form.state.clone())
            .text("zip_code", form.zip_code.clone())
            .text("processed_image", form.processed_image.clone())
            .text("rtu_count", form.rtu_count.to_string());
        if let Some(coords) = form.coordinates {
            multipart = multipart
                .text("latitude", coords.lat().to_string())
                .text("longitude", coords.lng().to_string());
        }

        let url = self.endpoint(&["save_upload"]);
        tracing::debug!(%url, building = %form.building_name, "saving record");
        let response = self.client.post(url).multipart(multipart).send().await?;
        let body = Self::persistence_body(response, "record").await?;

        let wire: WireRecord =
            serde_json::from_str(&body).map_err(|e| PersistenceError::Deserialize {
                context: "POST /save_upload".to_string(),
                source: e,
            })?;
        Ok(normalize_record(wire))
    }

    /// Deletes a saved record.
    ///
    /// # Errors
    ///
    /// - [`PersistenceError::NotFound`] on HTTP 404.
    /// - [`PersistenceError::Rejected`] on any other non-2xx status.
    /// - [`PersistenceError::Http`] on network failure.
    pub async fn delete(&self, id: RecordId) -> Result<(), PersistenceError> {
        let segment = id.to_string();
        let url = self.endpoint(&["delete", &segment]);
        tracing::debug!(%url, "deleting record");
        let response = self.client.delete(url).send().await?;
        Self::persistence_body(response, &format!("record {id}")).await?;
        Ok(())
    }

    /// Marks a saved record as approved.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::delete`], plus [`PersistenceError::Deserialize`]
    /// if the body is not an approval response.
    pub async fn approve(&self, id: RecordId) -> Result<ApprovalResponse, PersistenceError> {
        let segment = id.to_string();
        let url = self.endpoint(&["approve", &segment]);
        let response = self.client.post(url).send().await?;
        let body = Self::persistence_body(response, &format!("record {id}")).await?;
        serde_json::from_str(&body).map_err(|e| PersistenceError::Deserialize {
            context: format!("POST /approve/{id}"),
            source: e,
        })
    }

    /// Fetches aggregate detection statistics.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::history`].
    pub async fn analytics(&self) -> Result<Analytics, PersistenceError> {
        let response = self.client.get(self.endpoint(&["analytics"])).send().await?;
        let body = Self::persistence_body(response, "analytics").await?;
        serde_json::from_str(&body).map_err(|e| PersistenceError::Deserialize {
            context: "GET /analytics".to_string(),
            source: e,
        })
    }

    /// Reads the body of a persistence response, mapping non-2xx statuses
    /// to typed errors.
    async fn persistence_body(response: Response, what: &str) -> Result<String, PersistenceError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let detail = parse_error_body(&body);
        if status == StatusCode::NOT_FOUND {
            return Err(PersistenceError::NotFound {
                what: what.to_string(),
            });
        }
        if !detail.fields.is_empty() {
            return Err(PersistenceError::FieldValidation {
                errors: detail.fields,
            });
        }
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            message: detail.message,
        })
    }
}
