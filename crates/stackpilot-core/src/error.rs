//! Portainer API error types

use thiserror::Error;

/// Errors raised by the Portainer API client.
///
/// Every client operation issues exactly one request and maps its failure
/// modes onto one of these variants; the engine only ever sees this type.
#[derive(Error, Debug)]
pub enum PortainerError {
    #[error("access token contains characters that cannot travel in a header")]
    InvalidAccessToken,

    #[error("{context}: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: Portainer returned {status}")]
    Status {
        context: String,
        status: reqwest::StatusCode,
    },

    #[error("{context}: could not parse response body: {source}")]
    InvalidResponse {
        context: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, PortainerError>;
