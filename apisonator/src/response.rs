//! Maps the outcome of an upstream call to the HTTP reply of the adapter.

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use shared::http::{empty_body, full_body};
use threescale::codes::status_for_code;
use threescale::{AuthorizationResult, ClientError};

/// Carries the backend rejection code of a denied request.
pub const REJECTION_REASON_HEADER: HeaderName = HeaderName::from_static("3scale-rejection-reason");

/// Status used for rejection codes missing from the code table.
pub const UNKNOWN_REJECTION_STATUS: StatusCode = StatusCode::NOT_IMPLEMENTED;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub rejection_reason: Option<String>,
    pub body: Option<String>,
}

impl Reply {
    pub fn from_result(result: Result<AuthorizationResult, ClientError>) -> Self {
        match result {
            Err(e) => Reply {
                status: StatusCode::BAD_GATEWAY,
                rejection_reason: None,
                body: Some(e.to_string()),
            },
            Ok(result) if result.authorized => Reply {
                status: StatusCode::OK,
                rejection_reason: None,
                body: None,
            },
            Ok(result) => Reply {
                status: status_for_code(&result.error_code).unwrap_or(UNKNOWN_REJECTION_STATUS),
                rejection_reason: Some(result.error_code),
                body: None,
            },
        }
    }

    pub fn into_response<E: 'static>(self) -> Response<BoxBody<Bytes, E>> {
        let mut response = match self.body {
            Some(body) => {
                let mut response = Response::new(full_body(body));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
            None => Response::new(empty_body()),
        };
        *response.status_mut() = self.status;

        if let Some(reason) = self.rejection_reason {
            match HeaderValue::from_str(&reason) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(REJECTION_REASON_HEADER, value);
                }
                Err(_) => tracing::warn!(
                    reason = %reason,
                    "rejection reason is not a valid header value"
                ),
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::convert::Infallible;

    #[test]
    fn test_authorized() {
        let reply = Reply::from_result(Ok(AuthorizationResult::authorized()));
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.rejection_reason, None);
        assert_eq!(reply.body, None);
    }

    #[test]
    fn test_known_rejection() {
        let reply = Reply::from_result(Ok(AuthorizationResult::denied("service_id_invalid")));
        assert_eq!(
            Some(reply.status),
            status_for_code("service_id_invalid"),
            "status comes from the code table"
        );
        assert_eq!(reply.rejection_reason.as_deref(), Some("service_id_invalid"));

        let reply = Reply::from_result(Ok(AuthorizationResult::denied("limits_exceeded")));
        assert_eq!(reply.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_unknown_rejection() {
        let reply = Reply::from_result(Ok(AuthorizationResult::denied("brand_new_code")));
        assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(reply.rejection_reason.as_deref(), Some("brand_new_code"));

        let reply = Reply::from_result(Ok(AuthorizationResult::denied("")));
        assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(reply.rejection_reason.as_deref(), Some(""));
    }

    #[test]
    fn test_upstream_error() {
        let error = ClientError::InvalidResponse("garbage".into());
        let message = error.to_string();
        let reply = Reply::from_result(Err(error));
        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(reply.rejection_reason, None);
        assert_eq!(reply.body, Some(message));
    }

    #[tokio::test]
    async fn test_into_response() {
        let response = Reply::from_result(Ok(AuthorizationResult::denied("user_key_invalid")))
            .into_response::<Infallible>();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("3scale-rejection-reason").unwrap(),
            "user_key_invalid"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());

        let response = Reply::from_result(Err(ClientError::InvalidResponse("bad".into())))
            .into_response::<Infallible>();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(REJECTION_REASON_HEADER).is_none());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("invalid upstream response: bad"));

        // Codes that cannot be sent as a header are dropped, the status is kept
        let response = Reply::from_result(Ok(AuthorizationResult::denied("bad\ncode")))
            .into_response::<Infallible>();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(response.headers().get(REJECTION_REASON_HEADER).is_none());
    }
}
