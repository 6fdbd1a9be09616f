//! # Error Types
//!
//! Two error layers mirror the two halves of the crate:
//!
//! - [`ProviderError`] — everything that can go wrong while talking to one
//!   upstream: transport failures, HTTP error statuses, timeouts, malformed
//!   bodies. Classified into retryable (transient) and non-retryable
//!   (permanent) failures, which drives both failover and the circuit
//!   breaker.
//! - [`RouterError`] — the router's own failures: an empty eligible set,
//!   exhausted retries (wrapping the last upstream error with the provider
//!   name and attempt count), cancellation, and invalid administrative
//!   input.
//!
//! The split keeps adapters ignorant of routing policy: an adapter only
//! reports *what* happened; the orchestrator decides whether to fail over.

use thiserror::Error;

/// Provider-level API and communication errors.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP client and network communication errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider API error with status code and message
    #[error("API error: {code} - {message}")]
    Api { code: u16, message: String },

    /// Rate limit exceeded for this provider
    #[error("rate limited")]
    RateLimited,

    /// Provider service temporarily unavailable
    #[error("service unavailable")]
    ServiceUnavailable,

    /// Request timed out
    #[error("timeout")]
    Timeout,

    /// Invalid or missing API key
    #[error("invalid API key")]
    InvalidApiKey,

    /// Requested model not found or unsupported
    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    /// Response body did not match the expected shape
    #[error("invalid response format")]
    InvalidResponse,

    /// JSON serialization and deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing provider configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Capability not implemented by this provider
    #[error("unsupported: {feature}")]
    Unsupported { feature: String },

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether the failover orchestrator may try another provider.
    ///
    /// Transient classes: network errors, 5xx, 408, 429 and timeouts.
    /// Everything else (other 4xx, malformed bodies, configuration,
    /// cancellation) surfaces to the caller unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Api { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            ProviderError::RateLimited
            | ProviderError::ServiceUnavailable
            | ProviderError::Timeout => true,
            _ => false,
        }
    }

    /// Whether this failure counts toward the provider's circuit breaker.
    ///
    /// Same set as [`is_retryable`](Self::is_retryable): permanent 4xx
    /// answers prove the upstream is alive and must not trip the breaker.
    pub fn trips_breaker(&self) -> bool {
        self.is_retryable()
    }

    /// HTTP status carried by a permanent upstream answer, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { code, .. } => Some(*code),
            ProviderError::InvalidApiKey => Some(401),
            ProviderError::ModelNotFound { .. } => Some(404),
            ProviderError::RateLimited => Some(429),
            _ => None,
        }
    }
}

/// Router-level errors returned by [`crate::router::SmartRouter`].
#[derive(Error, Debug)]
pub enum RouterError {
    /// The eligible set was empty before any attempt was made
    #[error("no available provider")]
    NoAvailableProvider,

    /// Retries exhausted or a non-retryable upstream failure
    #[error("upstream error from {provider} after {attempts} attempt(s): {source}")]
    Upstream {
        provider: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// Invalid configuration passed to a constructor or admin call
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    /// Admin operation referenced a provider that is not registered
    #[error("unknown provider: {name}")]
    UnknownProvider { name: String },

    /// `add_provider` collided with an existing name
    #[error("provider already registered: {name}")]
    DuplicateProvider { name: String },
}
