//! Stateful helper for multi-step web logins.

use std::collections::BTreeMap;

use carlink_client::{ApiHttpClient, ApiResult, Headers, HttpBody};
use url::Url;

use crate::error::{IdentityError, Result};
use crate::pkce::PkceChallenge;
use crate::scrape;
use crate::token::OAuthToken;

/// Hidden form fields collected from login pages.
const FORM_FIELDS: [&str; 3] = ["_csrf", "relayState", "hmac"];

/// Session state of one login attempt.
///
/// Owns the session transport (and therefore its cookies), the OAuth fields
/// gathered so far and the last response.
#[derive(Debug, Clone)]
pub struct OAuthFlow {
    http: ApiHttpClient,
    headers: Headers,
    fields: BTreeMap<String, String>,
    url: String,
    status: u16,
    body: String,
    location: String,
    pub pkce: Option<PkceChallenge>,
}

impl OAuthFlow {
    pub fn new(http: ApiHttpClient) -> Self {
        Self {
            http,
            headers: Headers::new(),
            fields: BTreeMap::new(),
            url: String::new(),
            status: 0,
            body: String::new(),
            location: String::new(),
            pkce: None,
        }
    }

    /// Headers sent with every flow request.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn http(&self) -> &ApiHttpClient {
        &self.http
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// URL of the last request.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// `Location` of the last response, empty when none.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Resolve a possibly relative location against the last request URL.
    pub fn resolve(&self, location: &str) -> Result<String> {
        if self.url.is_empty() || Url::parse(location).is_ok() {
            return Ok(location.to_string());
        }
        Ok(Url::parse(&self.url)?.join(location)?.to_string())
    }

    /// GET `url` without following redirects.
    pub async fn get(&mut self, url: &str) -> Result<&str> {
        let url = self.resolve(url)?;
        let res = self.http.get(&url, &self.headers).await?;
        self.record(res);
        Ok(&self.body)
    }

    /// POST a form to `url`.
    pub async fn post_form(&mut self, url: &str, form: Vec<(String, String)>) -> Result<&str> {
        let url = self.resolve(url)?;
        let res = self
            .http
            .post(&url, &self.headers, HttpBody::Form(form))
            .await?;
        self.record(res);
        Ok(&self.body)
    }

    fn record(&mut self, res: ApiResult) {
        tracing::trace!(url = %res.url, status = res.status, "login step");
        self.url = res.url;
        self.status = res.status;
        self.body = res.body;
        self.location = res.location.unwrap_or_default();
    }

    /// Follow the pending redirect, if any.
    ///
    /// Returns the resolved target, or `None` when the last response was not
    /// a redirect.
    pub async fn follow(&mut self) -> Result<Option<String>> {
        if self.location.is_empty() {
            return Ok(None);
        }
        let target = self.resolve(&self.location.clone())?;
        self.absorb_location(&target);
        self.get(&target).await?;
        Ok(Some(target))
    }

    /// Pick up `_csrf`, `relayState` and `hmac` from a login page.
    pub fn absorb_html(&mut self) {
        let html = self.body.clone();
        for name in FORM_FIELDS {
            let value = scrape::input_value(&html, name)
                .or_else(|| scrape::json_string_value(&html, name))
                .or_else(|| {
                    (name == "_csrf")
                        .then(|| scrape::json_string_value(&html, "csrf_token"))
                        .flatten()
                });
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                self.fields.insert(name.to_string(), v);
            }
        }
    }

    /// Pick up query and fragment parameters from a location.
    pub fn absorb_location(&mut self, location: &str) {
        for (k, v) in scrape::query_params(location) {
            if !v.is_empty() {
                self.fields.insert(k, v);
            }
        }
    }

    /// Values for the hidden form fields, in page order.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        FORM_FIELDS
            .iter()
            .filter_map(|name| self.field(name).map(|v| (name.to_string(), v.to_string())))
            .collect()
    }

    /// Token fields gathered so far.
    pub fn token(&self) -> OAuthToken {
        OAuthToken::from_fields(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Fail with a security error when a field is required but absent.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.field(name).ok_or_else(|| {
            IdentityError::Security(format!("Login failed, '{}' not found in login page", name))
        })
    }
}
