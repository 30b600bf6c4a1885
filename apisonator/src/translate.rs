//! Builds an authorization request out of the query string of the legacy
//! `/transactions/*.xml` endpoints.
//!
//! Translation never fails. Malformed percent-encoding is decoded lossily and
//! usage values that are not integers are dropped. For repeated keys the last
//! occurrence wins.

use std::collections::HashMap;
use threescale::{AuthorizationRequest, ClientCredential, Metrics, Params, Transaction};
use url::form_urlencoded;

pub fn translate_query(query: Option<&str>) -> AuthorizationRequest {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut metrics = Metrics::new();

    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match usage_metric_name(&key) {
            Some(metric) => match value.parse::<i64>() {
                Ok(usage) => {
                    metrics.insert(metric.to_string(), usage);
                }
                Err(_) => {
                    metrics.shift_remove(metric);
                }
            },
            None => {
                fields.insert(key.into_owned(), value.into_owned());
            }
        }
    }

    let mut take = |name: &str| fields.remove(name).unwrap_or_default();

    let auth = match take("service_token") {
        token if !token.is_empty() => ClientCredential::ServiceToken(token),
        _ => ClientCredential::ProviderKey(take("provider_key")),
    };

    AuthorizationRequest {
        auth,
        service: take("service_id"),
        transactions: vec![Transaction {
            params: Params {
                app_id: take("app_id"),
                app_key: take("app_key"),
                referrer: take("referrer"),
                user_id: take("user_id"),
                user_key: take("user_key"),
            },
            metrics,
        }],
    }
}

/// Returns `name` for keys of the form `usage[name]`.
fn usage_metric_name(key: &str) -> Option<&str> {
    key.strip_prefix("usage[")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty() && !name.contains(']'))
}
