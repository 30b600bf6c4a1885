use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use threescale::{AuthorizationRequest, AuthorizationResult, Client, ClientError};

/// Upstream client returning canned results and counting calls.
pub(crate) struct MockClient {
    pub result: Result<AuthorizationResult, String>,
    pub authorize_calls: AtomicUsize,
    pub auth_rep_calls: AtomicUsize,
    pub flush_calls: AtomicUsize,
    pub last_request: Mutex<Option<AuthorizationRequest>>,
}

impl MockClient {
    pub(crate) fn new(result: Result<AuthorizationResult, String>) -> Arc<Self> {
        Arc::new(MockClient {
            result,
            authorize_calls: AtomicUsize::new(0),
            auth_rep_calls: AtomicUsize::new(0),
            flush_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn respond(&self, request: AuthorizationRequest) -> Result<AuthorizationResult, ClientError> {
        *self.last_request.lock() = Some(request);
        self.result.clone().map_err(ClientError::InvalidResponse)
    }
}

#[async_trait]
impl Client for MockClient {
    async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(request)
    }

    async fn auth_rep(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        self.auth_rep_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(request)
    }

    async fn flush(&self) -> Result<(), ClientError> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(_) => Ok(()),
            Err(e) => Err(ClientError::InvalidResponse(e.clone())),
        }
    }
}
