use indexmap::IndexMap;

pub type ServiceId = String;

/// Usage deltas keyed by metric system name.
pub type Metrics = IndexMap<String, i64>;

/// Credential identifying the caller of the backend API.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClientCredential {
    ServiceToken(String),
    ProviderKey(String),
}

impl ClientCredential {
    /// Name of the query/form parameter carrying this credential.
    pub fn param_name(&self) -> &'static str {
        match self {
            ClientCredential::ServiceToken(_) => "service_token",
            ClientCredential::ProviderKey(_) => "provider_key",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            ClientCredential::ServiceToken(value) | ClientCredential::ProviderKey(value) => value,
        }
    }
}

impl Default for ClientCredential {
    fn default() -> Self {
        ClientCredential::ProviderKey(String::new())
    }
}

/// Application and user identification of a transaction. Empty means absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Params {
    pub app_id: String,
    pub app_key: String,
    pub referrer: String,
    pub user_id: String,
    pub user_key: String,
}

impl Params {
    /// Non-empty params as `(name, value)` pairs, in protocol order.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
            ("referrer", self.referrer.as_str()),
            ("user_id", self.user_id.as_str()),
            ("user_key", self.user_key.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub params: Params,
    pub metrics: Metrics,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub auth: ClientCredential,
    pub service: ServiceId,
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub authorized: bool,
    /// Rejection reason. Empty when authorized.
    pub error_code: String,
}

impl AuthorizationResult {
    pub fn authorized() -> Self {
        Self {
            authorized: true,
            error_code: String::new(),
        }
    }

    pub fn denied(error_code: impl Into<String>) -> Self {
        Self {
            authorized: false,
            error_code: error_code.into(),
        }
    }
}
