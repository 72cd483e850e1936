use http::StatusCode;
use thiserror::Error;

/// Failures that end a proxied request and are reported to the client.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Unknown origin: {0}")]
    UnknownHost(String),

    #[error("Error fetching from origin: {0}")]
    OriginUnreachable(String),

    /// The origin answered with a success status but the body could not be read.
    #[error("Error reading response body")]
    OriginBodyRead(String),

    #[error("Error from origin: {}", .0.as_u16())]
    OriginError(StatusCode),
}

impl ProxyError {
    /// Status code sent back to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnknownHost(_) => StatusCode::NOT_FOUND,
            ProxyError::OriginUnreachable(_) | ProxyError::OriginBodyRead(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::OriginError(status) => *status,
        }
    }
}

/// Cache-layer failures. These never reach the client.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache entry {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write cache entry {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
