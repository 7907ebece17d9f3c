//! HTTP client for the geocoding provider's JSON API.
//!
//! Wraps `reqwest` with API key handling and typed parsing of the first
//! result. `ZERO_RESULTS` maps to `Ok(None)`; any other non-`OK` status
//! surfaces as [`GeocodeError::Provider`]. There is no retry at this layer.

use std::time::Duration;

use reqwest::{Client, Url};
use rtumap_core::config::DEFAULT_GEOCODE_BASE_URL;
use rtumap_core::Coordinates;

use crate::error::GeocodeError;
use crate::types::{GeocodeEnvelope, GeocodeResult, GeocodedPlace};

/// Client for forward and reverse geocoding.
///
/// Use [`GeocodeClient::new`] for the production provider or
/// [`GeocodeClient::with_base_url`] to point at a mock server in tests.
pub struct GeocodeClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl GeocodeClient {
    /// Creates a client pointed at the production geocoding endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64, user_agent: &str) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, DEFAULT_GEOCODE_BASE_URL)
    }

    /// Creates a client with a custom endpoint URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`GeocodeError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let base_url = Url::parse(base_url).map_err(|e| GeocodeError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Resolves a coordinate to the nearest street address.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::Provider`] if the provider rejects the request.
    /// - [`GeocodeError::Http`] on network failure or non-2xx HTTP status.
    /// - [`GeocodeError::Malformed`] if the first result lacks address components.
    pub async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let latlng = format!("{},{}", coords.lat(), coords.lng());
        let url = self.build_url(&[("latlng", &latlng)]);
        self.lookup(&url, &format!("reverse({latlng})")).await
    }

    /// Resolves a free-form address or place query.
    ///
    /// A blank query resolves to `Ok(None)` without a request.
    ///
    /// # Errors
    ///
    /// Same as [`GeocodeClient::reverse_geocode`].
    pub async fn forward_geocode(
        &self,
        query: &str,
    ) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }
        let url = self.build_url(&[("address", query)]);
        self.lookup(&url, &format!("forward({query})")).await
    }

    /// Appends the query parameters plus the API key, percent-encoded.
    fn build_url(&self, extra: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("key", &self.api_key);
        }
        url
    }

    async fn lookup(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<Option<GeocodedPlace>, GeocodeError> {
        tracing::debug!(context, "geocoding request");
        let response = self.client.get(url.clone()).send().await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;

        let envelope: GeocodeEnvelope =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Malformed {
                context: context.to_string(),
                source: e,
            })?;

        match envelope.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(None),
            _ => {
                return Err(GeocodeError::Provider {
                    status: envelope.status,
                    message: envelope
                        .error_message
                        .unwrap_or_else(|| "no error message".to_string()),
                })
            }
        }

        let Some(first) = envelope.results.into_iter().next() else {
            return Ok(None);
        };

        let result: GeocodeResult =
            serde_json::from_value(first).map_err(|e| GeocodeError::Malformed {
                context: context.to_string(),
                source: e,
            })?;

        Ok(Some(result.into_place()))
    }
}
