//! Provider error types

use itinera_planner::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider unavailable: {provider}")]
    Unavailable { provider: String },

    #[error("{provider} reported: {message}")]
    Upstream { provider: String, message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network(_) | Self::Unavailable { .. }
        )
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Map a non-success HTTP status to the matching error, passing successful
/// responses through.
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        // Retry-After in seconds when present, otherwise a minute
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(60000);
        return Err(ProviderError::RateLimited { retry_after_ms });
    }

    if status.is_server_error() {
        return Err(ProviderError::Unavailable {
            provider: provider.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ProviderError::AuthenticationFailed(format!(
            "{} returned {}: {}",
            provider, status, body
        )));
    }

    Err(ProviderError::InvalidResponse(format!(
        "API error {}: {}",
        status, body
    )))
}

impl From<ProviderError> for CollaboratorError {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::InvalidInput(_) => CollaboratorError::InvalidInput(message),
            ProviderError::InvalidResponse(_) => CollaboratorError::InvalidResponse(message),
            ProviderError::RateLimited { .. }
            | ProviderError::Network(_)
            | ProviderError::Unavailable { .. } => CollaboratorError::Unavailable(message),
            ProviderError::AuthenticationFailed(_)
            | ProviderError::Configuration(_)
            | ProviderError::Upstream { .. } => CollaboratorError::Provider(message),
        }
    }
}
