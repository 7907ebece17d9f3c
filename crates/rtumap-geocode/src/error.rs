use thiserror::Error;

/// Errors returned by the geocoding provider client.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a status other than `OK` or `ZERO_RESULTS`
    /// (e.g. `REQUEST_DENIED`, `OVER_QUERY_LIMIT`).
    #[error("geocoding provider returned {status}: {message}")]
    Provider { status: String, message: String },

    /// The response body did not match the provider's documented shape,
    /// e.g. a result without an `address_components` list.
    #[error("malformed geocoding response for {context}: {source}")]
    Malformed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid geocoding base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
