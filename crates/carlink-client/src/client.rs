//! Main transport implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, LOCATION};

use crate::error::{Error, Result};
use crate::error_body::ApiErrorDetail;
use crate::{CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_XML};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header reporting the remaining API call budget.
const RATE_LIMIT_HEADER: &str = "vcf-remaining-calls";

/// Request header map (name → value).
pub type Headers = BTreeMap<String, String>;

// ─────────────────────────────────────────────────────────────────────────────
// Request body
// ─────────────────────────────────────────────────────────────────────────────

/// Request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HttpBody {
    #[default]
    Empty,
    /// Pre-encoded body; content type is detected from its shape.
    Raw(String),
    /// Form fields, sent url-encoded.
    Form(Vec<(String, String)>),
}

impl HttpBody {
    /// Build a form body from key/value pairs.
    pub fn form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        HttpBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Content type implied by the body shape.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            HttpBody::Empty => None,
            HttpBody::Form(_) => Some(CONTENT_TYPE_FORM),
            HttpBody::Raw(s) => {
                let t = s.trim_start();
                if t.starts_with('{') || t.starts_with('[') {
                    Some(CONTENT_TYPE_JSON)
                } else if t.starts_with('<') {
                    Some(CONTENT_TYPE_XML)
                } else if t.is_empty() {
                    None
                } else {
                    Some(CONTENT_TYPE_FORM)
                }
            }
        }
    }

    /// Encoded body text.
    pub fn encode(&self) -> String {
        match self {
            HttpBody::Empty => String::new(),
            HttpBody::Raw(s) => s.clone(),
            HttpBody::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields.iter())
                .finish(),
        }
    }
}

impl From<String> for HttpBody {
    fn from(s: String) -> Self {
        if s.is_empty() {
            HttpBody::Empty
        } else {
            HttpBody::Raw(s)
        }
    }
}

impl From<&str> for HttpBody {
    fn from(s: &str) -> Self {
        HttpBody::from(s.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Classified successful or redirect response.
#[derive(Debug, Clone, Default)]
pub struct ApiResult {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Response headers with lowercased names.
    pub headers: BTreeMap<String, String>,
    /// `Location` header, if any.
    pub location: Option<String>,
}

impl ApiResult {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }

    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status)
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Server `Date` header.
    pub fn response_date(&self) -> Option<&str> {
        self.header("date")
    }

    /// Remaining API calls reported by the server.
    pub fn rate_limit(&self) -> Option<u32> {
        self.header(RATE_LIMIT_HEADER)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Location, or an empty string.
    pub fn location_or_empty(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }
}

fn is_success_status(status: u16) -> bool {
    matches!(status, 200 | 201 | 202 | 204 | 207 | 303)
}

fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 307)
}

fn is_security_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 405)
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP transport with its own cookie jar.
///
/// Clones share the underlying connection pool and cookies, so one client
/// represents one authentication session.
#[derive(Clone)]
pub struct ApiHttpClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    timeout: Duration,
}

impl std::fmt::Debug for ApiHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiHttpClient")
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl ApiHttpClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str, headers: &Headers) -> Result<ApiResult> {
        self.request(Method::GET, url, headers, HttpBody::Empty)
            .await
    }

    /// Make a POST request.
    pub async fn post(&self, url: &str, headers: &Headers, body: HttpBody) -> Result<ApiResult> {
        self.request(Method::POST, url, headers, body).await
    }

    /// Make a PUT request.
    pub async fn put(&self, url: &str, headers: &Headers, body: HttpBody) -> Result<ApiResult> {
        self.request(Method::PUT, url, headers, body).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: HttpBody,
    ) -> Result<ApiResult> {
        let mut request = self
            .inner
            .http
            .request(method.clone(), url)
            .timeout(self.inner.timeout);

        let mut has_content_type = false;
        for (name, value) in headers {
            has_content_type |= name.eq_ignore_ascii_case(CONTENT_TYPE.as_str());
            request = request.header(name.as_str(), value.as_str());
        }
        if !has_content_type && let Some(ct) = body.content_type() {
            request = request.header(CONTENT_TYPE, ct);
        }
        if body != HttpBody::Empty {
            request = request.body(body.encode());
        }

        tracing::trace!(%method, url, "http request");
        let response = request.send().await?;
        let status = response.status().as_u16();

        let mut response_headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        tracing::debug!(%method, url, status, "http response");

        let result = ApiResult {
            method: method.to_string(),
            url: url.to_string(),
            status,
            body,
            headers: response_headers,
            location,
        };
        classify(result)
    }
}

/// Map a raw response onto success, redirect or error.
fn classify(result: ApiResult) -> Result<ApiResult> {
    let status = result.status;
    let detail = ApiErrorDetail::parse(&result.body);

    if is_redirect_status(status) {
        return Ok(result);
    }

    if is_success_status(status) {
        return match detail {
            Some(d) => Err(Error::Api {
                status,
                code: d.code.clone(),
                message: d.message(),
                detail: Some(d),
            }),
            None => Ok(result),
        };
    }

    let message = detail
        .as_ref()
        .map(ApiErrorDetail::message)
        .unwrap_or_else(|| format!("HTTP {} for {} {}", status, result.method, result.url));

    if is_security_status(status) {
        return Err(Error::Security {
            status,
            message,
            detail,
        });
    }

    Err(Error::Api {
        status,
        code: detail
            .as_ref()
            .map(|d| d.code.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        message,
        detail,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an [`ApiHttpClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiHttpClient> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("carlink/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .user_agent(user_agent)
            .build()?;

        Ok(ApiHttpClient {
            inner: Arc::new(ClientInner {
                http,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
