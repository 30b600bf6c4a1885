//! Client side of the 3scale backend (Apisonator) authorization protocol.
//!
//! [`Client`] is the capability the HTTP adapter depends on. [`Backend`] is the
//! implementation that talks to a real Apisonator over HTTP and buffers usage
//! reports until the next [`Client::flush`].

pub mod backend;
pub mod client;
pub mod codes;
pub mod metrics_defs;
pub mod types;

pub use backend::{Backend, BackendOptions, validate_upstream};
pub use client::{Client, ClientError, UpstreamError};
pub use types::{
    AuthorizationRequest, AuthorizationResult, ClientCredential, Metrics, Params, ServiceId,
    Transaction,
};
