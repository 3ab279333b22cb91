//! Membership API client error types.
//!
//! Disperse relay errors live next to the adapter trait in
//! [`crate::disperse`], since callers branch on them.

/// Errors from membership API calls.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The API returned a non-2xx status.
    #[error("membership API {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The community exists but has no role with the requested id.
    #[error("role {role_id} not found in community {community}")]
    RoleNotFound { community: String, role_id: u64 },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
