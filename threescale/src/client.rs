use crate::types::{AuthorizationRequest, AuthorizationResult};
use async_trait::async_trait;

/// Reasons an upstream base URL is refused.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("upstream must be provided")]
    Missing,
    #[error("failed to parse provided upstream {0}: {1}")]
    Parse(String, url::ParseError),
    #[error("upstream {0} must use http or https")]
    UnsupportedScheme(String),
    #[error("upstream {0} must not carry a query or fragment")]
    QueryOrFragment(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid upstream: {0}")]
    InvalidUpstream(#[from] UpstreamError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream responded with {status}: {body}")]
    UnexpectedStatus {
        status: http::StatusCode,
        body: String,
    },
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

/// Authorization capability of the upstream peer.
///
/// Implementations must be safe to call concurrently from any number of
/// tasks; callers share a single instance and never lock it.
#[async_trait]
pub trait Client: Send + Sync {
    /// Checks whether the request is authorized without reporting usage.
    async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError>;

    /// Checks whether the request is authorized and, if so, reports its usage.
    async fn auth_rep(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError>;

    /// Synchronizes any buffered state with the upstream.
    async fn flush(&self) -> Result<(), ClientError>;
}
