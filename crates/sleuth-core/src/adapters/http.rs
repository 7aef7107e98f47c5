use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::domain::{Record, SearchType};
use crate::error::ConfigError;
use crate::http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
use crate::provider::{ErrorCode, ProviderFuture, ProviderResponse, SearchProvider};

/// Generic adapter for lookup services that speak JSON over HTTP.
///
/// Sends `{"type": ..., "query": ...}` to the endpoint (or the same pair as
/// query parameters for `GET`) and accepts a body that is either a record
/// array or an object carrying one under `results` or `data`.
#[derive(Clone)]
pub struct HttpJsonProvider {
    id: String,
    endpoint: String,
    health_url: Option<String>,
    method: HttpMethod,
    auth: HttpAuth,
    timeout: Duration,
    http_client: Arc<dyn HttpClient>,
}

#[derive(Serialize)]
struct LookupBody<'a> {
    #[serde(rename = "type")]
    search_type: &'a str,
    query: &'a str,
}

impl HttpJsonProvider {
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            health_url: None,
            method: HttpMethod::Post,
            auth: HttpAuth::None,
            timeout: DEFAULT_TIMEOUT,
            http_client,
        }
    }

    /// Builds the adapter for a configuration entry, reading its API key
    /// from the environment variable named by `api_key_env`.
    pub fn from_config(
        config: &ProviderConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEndpoint {
                id: config.id.clone(),
            })?;

        let mut provider = Self::new(config.id.clone(), endpoint, http_client);
        if let Some(url) = &config.health_url {
            provider = provider.with_health_url(url.as_str());
        }
        if let Some(token) = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
        {
            provider.auth = HttpAuth::BearerToken(token);
        }
        Ok(provider)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL probed by `is_available`; defaults to the lookup endpoint.
    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    fn lookup_request(&self, query: &str, search_type: SearchType) -> Result<HttpRequest, String> {
        let request = match self.method {
            HttpMethod::Get => HttpRequest::get(format!(
                "{}?type={}&query={}",
                self.endpoint,
                urlencoding::encode(search_type.as_str()),
                urlencoding::encode(query)
            )),
            HttpMethod::Post => {
                let body = serde_json::to_string(&LookupBody {
                    search_type: search_type.as_str(),
                    query,
                })
                .map_err(|error| format!("failed to encode request body: {error}"))?;
                HttpRequest::post_json(self.endpoint.as_str(), body)
            }
        };

        Ok(request
            .header("accept", "application/json")
            .auth(&self.auth)
            .timeout(self.timeout))
    }

    fn translate(&self, response: HttpResponse) -> ProviderResponse {
        if let Some(code) = status_error_code(response.status) {
            return ProviderResponse::failed(
                self.id.as_str(),
                code,
                format!("upstream returned status {}", response.status),
            );
        }

        match parse_records(&response.body) {
            Ok(records) if records.is_empty() => ProviderResponse::empty(self.id.as_str()),
            Ok(records) => ProviderResponse::found(self.id.as_str(), records),
            Err(message) => {
                ProviderResponse::failed(self.id.as_str(), ErrorCode::ParsingError, message)
            }
        }
    }

    fn transport_failure(&self, error: &HttpError) -> ProviderResponse {
        let code = match error.kind() {
            HttpErrorKind::Timeout => ErrorCode::TimeoutError,
            HttpErrorKind::Connect | HttpErrorKind::Other => ErrorCode::NetworkError,
        };
        ProviderResponse::failed(self.id.as_str(), code, error.to_string())
    }
}

impl SearchProvider for HttpJsonProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        search_type: SearchType,
    ) -> ProviderFuture<'a, ProviderResponse> {
        Box::pin(async move {
            let request = match self.lookup_request(query, search_type) {
                Ok(request) => request,
                Err(message) => {
                    return ProviderResponse::failed(
                        self.id.as_str(),
                        ErrorCode::UnknownError,
                        message,
                    )
                }
            };

            match self.http_client.execute(request).await {
                Ok(response) => self.translate(response),
                Err(error) => self.transport_failure(&error),
            }
        })
    }

    fn is_available(&self) -> ProviderFuture<'_, bool> {
        Box::pin(async move {
            let url = self.health_url.as_deref().unwrap_or(&self.endpoint);
            let request = HttpRequest::get(url).auth(&self.auth).timeout(self.timeout);

            match self.http_client.execute(request).await {
                Ok(response) => response.status < 500,
                Err(error) => {
                    tracing::debug!(provider = %self.id, error = %error, "availability probe failed");
                    false
                }
            }
        })
    }
}

/// Maps a non-success HTTP status onto the provider error taxonomy.
fn status_error_code(status: u16) -> Option<ErrorCode> {
    match status {
        200..=299 => None,
        401 | 403 => Some(ErrorCode::InvalidCredential),
        429 => Some(ErrorCode::RateLimit),
        400 | 422 => Some(ErrorCode::ValidationError),
        500..=599 => Some(ErrorCode::ProviderUnavailable),
        _ => Some(ErrorCode::UnknownError),
    }
}

fn parse_records(body: &str) -> Result<Vec<Record>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value = serde_json::from_str::<Value>(body)
        .map_err(|error| format!("response body is not valid JSON: {error}"))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("results").or_else(|| object.remove("data")) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => vec![other],
            None if object.is_empty() => Vec::new(),
            None => vec![Value::Object(object)],
        },
        Value::Null => Vec::new(),
        other => return Err(format!("unexpected response body of type {}", json_kind(&other))),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(_) => Ok(Record::from_value(item)),
            other => Err(format!("record entry is a {}, expected an object", json_kind(&other))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
