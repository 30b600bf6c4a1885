//! Rejection reason codes of the backend protocol and their HTTP statuses.
//!
//! The table is static. Codes missing from it are still valid rejections:
//! callers must handle `None` with a fallback status, which is how new
//! upstream codes are tolerated without changing this table.

use http::StatusCode;

const CODES: &[(&str, StatusCode)] = &[
    ("application_key_invalid", StatusCode::CONFLICT),
    ("application_not_active", StatusCode::CONFLICT),
    ("application_not_found", StatusCode::NOT_FOUND),
    ("application_token_invalid", StatusCode::FORBIDDEN),
    ("limits_exceeded", StatusCode::CONFLICT),
    ("metric_invalid", StatusCode::NOT_FOUND),
    ("oauth_not_enabled", StatusCode::CONFLICT),
    ("provider_key_invalid", StatusCode::FORBIDDEN),
    ("provider_key_or_service_token_required", StatusCode::FORBIDDEN),
    ("redirect_uri_invalid", StatusCode::FORBIDDEN),
    ("referrer_filter_invalid", StatusCode::UNPROCESSABLE_ENTITY),
    ("referrer_not_allowed", StatusCode::CONFLICT),
    ("required_params_missing", StatusCode::UNPROCESSABLE_ENTITY),
    ("service_id_invalid", StatusCode::FORBIDDEN),
    ("service_id_missing", StatusCode::FORBIDDEN),
    ("service_token_invalid", StatusCode::FORBIDDEN),
    ("usage_value_invalid", StatusCode::UNPROCESSABLE_ENTITY),
    ("user_key_invalid", StatusCode::FORBIDDEN),
    ("user_requires_registration", StatusCode::CONFLICT),
];

/// HTTP status the backend associates with a rejection code, if known.
pub fn status_for_code(code: &str) -> Option<StatusCode> {
    CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, status)| *status)
}
