use crate::client::{Client, ClientError, UpstreamError};
use crate::metrics_defs::{REPORTS_BUFFERED, REPORTS_SENT};
use crate::types::{
    AuthorizationRequest, AuthorizationResult, ClientCredential, Metrics, Params, ServiceId,
    Transaction,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use reqwest::{Response, Url};
use std::time::Duration;

const AUTHORIZE_PATH: &str = "transactions/authorize.xml";
const REPORT_PATH: &str = "transactions.xml";

/// Asks the backend to expose the rejection code as a response header.
const OPTIONS_HEADER: &str = "3scale-options";
const OPTIONS_VALUE: &str = "rejection_reason_header=1";
const REJECTION_REASON_HEADER: &str = "3scale-rejection-reason";

#[derive(Clone, Debug)]
pub struct BackendOptions {
    /// Bounds every upstream call, from connect to the end of the body.
    pub timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReportKey {
    service: ServiceId,
    auth: ClientCredential,
    params: Params,
}

/// HTTP client for an Apisonator backend.
///
/// Authorizations are forwarded synchronously. Usage of authorized `auth_rep`
/// calls is aggregated in memory and only reported upstream on `flush`.
pub struct Backend {
    client: reqwest::Client,
    /// Always ends with a slash so endpoint paths join below it.
    base_url: Url,
    reports: Mutex<IndexMap<ReportKey, Metrics>>,
}

impl Backend {
    pub fn new(upstream: &str, options: BackendOptions) -> Result<Self, ClientError> {
        let base_url = validate_upstream(upstream)?;
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Backend {
            client,
            base_url,
            reports: Mutex::new(IndexMap::new()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| UpstreamError::Parse(self.base_url.to_string(), e).into())
    }

    async fn send_authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        let mut url = self.endpoint(AUTHORIZE_PATH)?;
        url.query_pairs_mut().extend_pairs(authorize_query(request));

        let response = self
            .client
            .get(url)
            .header(OPTIONS_HEADER, OPTIONS_VALUE)
            .send()
            .await?;

        read_authorization(response).await
    }

    fn buffer_usage(&self, request: AuthorizationRequest) {
        let mut reports = self.reports.lock();
        for transaction in request.transactions {
            if transaction.metrics.is_empty() {
                continue;
            }
            let key = ReportKey {
                service: request.service.clone(),
                auth: request.auth.clone(),
                params: transaction.params,
            };
            let usage = reports.entry(key).or_default();
            for (metric, value) in transaction.metrics {
                let total = usage.entry(metric).or_insert(0);
                *total = total.saturating_add(value);
            }
        }
        shared::gauge!(REPORTS_BUFFERED).set(reports.len() as f64);
    }

    /// Takes everything buffered so far, grouped per service and credential.
    fn drain_reports(&self) -> Vec<(ServiceId, ClientCredential, Vec<Transaction>)> {
        let drained = std::mem::take(&mut *self.reports.lock());
        shared::gauge!(REPORTS_BUFFERED).set(0.0);

        let mut batches: IndexMap<(ServiceId, ClientCredential), Vec<Transaction>> =
            IndexMap::new();
        for (key, metrics) in drained {
            batches
                .entry((key.service, key.auth))
                .or_default()
                .push(Transaction {
                    params: key.params,
                    metrics,
                });
        }

        batches
            .into_iter()
            .map(|((service, auth), transactions)| (service, auth, transactions))
            .collect()
    }

    async fn send_report(
        &self,
        service: &str,
        auth: &ClientCredential,
        transactions: &[Transaction],
    ) -> Result<(), ClientError> {
        let url = self.endpoint(REPORT_PATH)?;
        let response = self
            .client
            .post(url)
            .form(&report_form(service, auth, transactions))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::UnexpectedStatus { status, body })
    }
}

#[async_trait]
impl Client for Backend {
    async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        self.send_authorize(&request).await
    }

    async fn auth_rep(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationResult, ClientError> {
        let result = self.send_authorize(&request).await?;
        if result.authorized {
            self.buffer_usage(request);
        }
        Ok(result)
    }

    async fn flush(&self) -> Result<(), ClientError> {
        let mut last_error = None;

        for (service, auth, transactions) in self.drain_reports() {
            match self.send_report(&service, &auth, &transactions).await {
                Ok(()) => {
                    tracing::debug!(
                        service = %service,
                        transactions = transactions.len(),
                        "reported usage"
                    );
                    shared::counter!(REPORTS_SENT, "result" => "ok").increment(1);
                }
                Err(e) => {
                    // Not re-buffered: a failed batch is lost.
                    tracing::warn!(service = %service, error = %e, "failed to report usage");
                    shared::counter!(REPORTS_SENT, "result" => "error").increment(1);
                    last_error = Some(e);
                }
            }
        }

        last_error.map_or(Ok(()), Err)
    }
}

/// Parses the base URL of an Apisonator backend.
///
/// Only absolute http(s) URLs without query or fragment are accepted. A path
/// prefix is kept and the returned URL always ends with a slash.
pub fn validate_upstream(upstream: &str) -> Result<Url, UpstreamError> {
    if upstream.trim().is_empty() {
        return Err(UpstreamError::Missing);
    }

    let mut url =
        Url::parse(upstream).map_err(|e| UpstreamError::Parse(upstream.to_string(), e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UpstreamError::UnsupportedScheme(upstream.to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(UpstreamError::QueryOrFragment(upstream.to_string()));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn authorize_query(request: &AuthorizationRequest) -> Vec<(String, String)> {
    let mut pairs = vec![
        (
            request.auth.param_name().to_string(),
            request.auth.value().to_string(),
        ),
        ("service_id".to_string(), request.service.clone()),
    ];

    // Authorize only carries a single transaction.
    if let Some(transaction) = request.transactions.first() {
        pairs.extend(
            transaction
                .params
                .pairs()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        pairs.extend(
            transaction
                .metrics
                .iter()
                .map(|(metric, value)| (format!("usage[{metric}]"), value.to_string())),
        );
    }

    pairs
}

fn report_form(
    service: &str,
    auth: &ClientCredential,
    transactions: &[Transaction],
) -> Vec<(String, String)> {
    let mut pairs = vec![
        (auth.param_name().to_string(), auth.value().to_string()),
        ("service_id".to_string(), service.to_string()),
    ];

    for (i, transaction) in transactions.iter().enumerate() {
        for (name, value) in transaction.params.pairs() {
            pairs.push((format!("transactions[{i}][{name}]"), value.to_string()));
        }
        for (metric, value) in &transaction.metrics {
            pairs.push((
                format!("transactions[{i}][usage][{metric}]"),
                value.to_string(),
            ));
        }
    }

    pairs
}

async fn read_authorization(response: Response) -> Result<AuthorizationResult, ClientError> {
    let status = response.status();

    if status.is_success() {
        return Ok(AuthorizationResult::authorized());
    }

    let header_code = response
        .headers()
        .get(REJECTION_REASON_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from);
    let body = response.text().await?;

    if !status.is_client_error() {
        return Err(ClientError::UnexpectedStatus { status, body });
    }

    header_code
        .or_else(|| error_code_from_body(&body).map(String::from))
        .map(AuthorizationResult::denied)
        .ok_or_else(|| {
            ClientError::InvalidResponse(format!("{status} response without a rejection reason"))
        })
}

/// Extracts `xyz` from an `<error code="xyz">` document. Single quotes and
/// other attributes around `code` are accepted, codes containing whitespace
/// are not.
fn error_code_from_body(body: &str) -> Option<&str> {
    let element = &body[body.find("<error")? + "<error".len()..];
    let element = &element[..element.find('>')?];

    let value = element
        .split_whitespace()
        .find_map(|attribute| attribute.strip_prefix("code="))?;
    let quote = value.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let value = &value[1..];
    let code = &value[..value.find(quote)?];
    (!code.is_empty()).then_some(code)
}
