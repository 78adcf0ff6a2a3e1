// src/http.rs
// Shared HTTP plumbing for the remote service adapters

use std::time::Duration;
use thiserror::Error;

/// Failure talking to a remote inference service, with retry classification
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Rate limit exceeded: {body}")]
    RateLimited { body: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Returns true if repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Network(_) | ServiceError::Timeout | ServiceError::RateLimited { .. } => {
                true
            }
            ServiceError::Http { status, .. } => *status >= 500,
            ServiceError::Auth { .. } | ServiceError::InvalidResponse(_) => false,
        }
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Auth { status, .. } | ServiceError::Http { status, .. } => Some(*status),
            ServiceError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Response body when the server answered, otherwise the error text
    pub fn body(&self) -> String {
        match self {
            ServiceError::Auth { body, .. }
            | ServiceError::RateLimited { body }
            | ServiceError::Http { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::InvalidResponse(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Turn a non-2xx response into a classified `ServiceError`
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = status.as_u16();
    let body = resp.text().await.unwrap_or_default();
    match code {
        401 | 403 => Err(ServiceError::Auth { status: code, body }),
        429 => Err(ServiceError::RateLimited { body }),
        _ => Err(ServiceError::Http { status: code, body }),
    }
}
