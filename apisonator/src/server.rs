use crate::config::Config;
use crate::errors::{ApisonatorError, Result};
use crate::flusher::Flusher;
use crate::metrics_defs::{REQUESTS, UPSTREAM_DURATION};
use crate::response::Reply;
use crate::translate::translate_query;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use routing::{Route, RouteActions};
use shared::http::make_boxed_error_response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threescale::{AuthorizationRequest, AuthorizationResult, Backend, Client, ClientError};

pub const AUTHORIZE_PATH: &str = "/transactions/authorize.xml";
pub const AUTHREP_PATH: &str = "/transactions/authrep.xml";

pub type HandlerBody = BoxBody<Bytes, ApisonatorError>;

type ResponseFuture = Pin<Box<dyn Future<Output = Response<HandlerBody>> + Send + 'static>>;

/// Upstream operation an endpoint is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Authorize,
    AuthRep,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Authorize => "authorize",
            Endpoint::AuthRep => "authrep",
        }
    }

    async fn call(
        self,
        client: &dyn Client,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        match self {
            Endpoint::Authorize => client.authorize(request).await,
            Endpoint::AuthRep => client.auth_rep(request).await,
        }
    }
}

/// Serves the authorization endpoints and owns the background flusher.
///
/// Every request is translated from its query string, forwarded to the shared
/// upstream client and mapped back to a status code. The request method and
/// body are ignored.
pub struct Server {
    routes: RouteActions<Endpoint>,
    client: Arc<dyn Client>,
    flusher: Flusher,
}

impl Server {
    /// Validates the config and connects to the configured upstream.
    /// Must be called from within a tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let backend = Backend::new(&config.upstream, config.backend_options())?;
        Ok(Self::with_client(Arc::new(backend), config.flush_interval()))
    }

    /// Must be called from within a tokio runtime.
    pub fn with_client(client: Arc<dyn Client>, flush_interval: Duration) -> Self {
        let routes = RouteActions::new(vec![
            Route::new(AUTHORIZE_PATH, Endpoint::Authorize),
            Route::new(AUTHREP_PATH, Endpoint::AuthRep),
        ]);
        let flusher = Flusher::spawn(client.clone(), flush_interval);

        Server {
            routes,
            client,
            flusher,
        }
    }

    /// Ready while the flusher is running.
    pub fn is_ready(&self) -> bool {
        self.flusher.is_running()
    }

    /// Stops the flusher and waits for it to exit. Requests are still served.
    pub async fn stop(&self) {
        self.flusher.stop().await;
    }

    pub fn handle<B>(&self, req: &Request<B>) -> ResponseFuture {
        let Some(&endpoint) = self.routes.resolve(req) else {
            tracing::debug!(
                method = %req.method(),
                path = %req.uri().path(),
                "No route matched"
            );
            return Box::pin(std::future::ready(make_boxed_error_response(
                StatusCode::NOT_FOUND,
            )));
        };

        let request = translate_query(req.uri().query());
        let client = self.client.clone();

        Box::pin(async move {
            let start = Instant::now();
            let result = endpoint.call(client.as_ref(), request).await;
            shared::histogram!(UPSTREAM_DURATION, "endpoint" => endpoint.name())
                .record(start.elapsed().as_secs_f64());

            if let Err(e) = &result {
                tracing::warn!(endpoint = endpoint.name(), error = %e, "upstream call failed");
            }

            let reply = Reply::from_result(result);
            tracing::debug!(
                endpoint = endpoint.name(),
                status = reply.status.as_u16(),
                rejection_reason = reply.rejection_reason.as_deref(),
                "handled request"
            );
            shared::counter!(
                REQUESTS,
                "endpoint" => endpoint.name(),
                "status" => reply.status.as_u16().to_string()
            )
            .increment(1);

            reply.into_response()
        })
    }
}

impl Service<Request<Incoming>> for Server {
    type Response = Response<HandlerBody>;
    type Error = ApisonatorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let response = self.handle(&req);
        Box::pin(async move { Ok(response.await) })
    }
}
