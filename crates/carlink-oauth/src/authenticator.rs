//! Brand login capability and the profile-driven web login.

use std::sync::Arc;

use async_trait::async_trait;
use carlink_client::{ApiHttpClient, Headers, HttpBody};
use carlink_config::{BrandProfile, TokenExchange};

use crate::context::Credentials;
use crate::error::{IdentityError, Result};
use crate::flow::OAuthFlow;
use crate::pkce::{PkceChallenge, generate_nonce, generate_state};
use crate::scrape::{self, LoginStep};
use crate::token::{ApiToken, OAuthToken};

/// Redirect hops followed before a login is abandoned.
pub const MAX_REDIRECTS: usize = 10;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

// ============================================================================
// BrandAuthenticator Trait
// ============================================================================

/// Brand-specific steps of obtaining and renewing tokens.
#[async_trait]
pub trait BrandAuthenticator: Send + Sync + std::fmt::Debug {
    /// Profile this authenticator logs in against.
    fn profile(&self) -> &BrandProfile;

    /// Start a login flow on the given session transport.
    fn new_flow(&self, http: ApiHttpClient) -> OAuthFlow {
        OAuthFlow::new(http)
    }

    /// Build the authorize URL and seed the flow with state, nonce and PKCE.
    async fn login_url(&self, flow: &mut OAuthFlow) -> Result<String>;

    /// Run the sign-in pages and return the fields of the final redirect.
    async fn login(
        &self,
        url: &str,
        flow: &mut OAuthFlow,
        credentials: &Credentials,
    ) -> Result<OAuthToken>;

    /// Turn the login result into an API access grant.
    async fn grant_access(&self, flow: &mut OAuthFlow) -> Result<OAuthToken>;

    /// Refresh-token grant.
    async fn refresh_token(&self, http: &ApiHttpClient, token: &ApiToken) -> Result<OAuthToken>;

    /// Hook to adjust the authorize URL.
    fn update_authorization_url(&self, url: String) -> String {
        url
    }

    /// Hook to adjust the sign-in form fields.
    fn update_signin_parameters(&self, _fields: &mut Vec<(String, String)>) {}
}

/// Shared authenticator handle.
pub type SharedAuthenticator = Arc<dyn BrandAuthenticator>;

// ============================================================================
// WebLoginAuthenticator
// ============================================================================

/// Generic identity-provider login driven by a [`BrandProfile`].
#[derive(Debug, Clone)]
pub struct WebLoginAuthenticator {
    profile: BrandProfile,
}

impl WebLoginAuthenticator {
    pub fn new(profile: BrandProfile) -> Self {
        Self { profile }
    }

    pub fn shared(profile: BrandProfile) -> SharedAuthenticator {
        Arc::new(Self::new(profile))
    }

    fn token_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), self.profile.user_agent.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        for (k, v) in &self.profile.token_headers {
            headers.insert(k.clone(), v.clone());
        }
        headers
    }

    async fn post_token(&self, http: &ApiHttpClient, url: &str, form: HttpBody) -> Result<OAuthToken> {
        let res = http.post(url, &self.token_headers(), form).await?;
        let token = OAuthToken::from_json(&res.body)?;
        if token.is_empty() {
            return Err(IdentityError::Api(format!(
                "Token endpoint returned no token: {}",
                url
            )));
        }
        Ok(token)
    }

    /// Follow redirects until a page is reached or the login completes.
    ///
    /// Returns true once the redirect URI was reached.
    async fn follow_redirects(&self, flow: &mut OAuthFlow) -> Result<bool> {
        for _ in 0..MAX_REDIRECTS {
            let location = flow.location().to_string();
            if location.is_empty() {
                if matches!(flow.status(), 301 | 302 | 303 | 307) {
                    return Err(IdentityError::Security(
                        "Login failed, redirect without location".to_string(),
                    ));
                }
                return Ok(false);
            }
            match scrape::classify_location(&location, &self.profile.redirect_uri) {
                LoginStep::Completed => {
                    flow.absorb_location(&location);
                    return Ok(true);
                }
                LoginStep::Continue => {
                    tracing::trace!(location = %location, "following login redirect");
                    flow.follow().await?;
                }
                step => return Err(login_error(&step)),
            }
        }
        Err(IdentityError::Security(
            "Login failed, too many redirects".to_string(),
        ))
    }

    fn signin_fields(&self, flow: &OAuthFlow, extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut fields = flow.form_fields();
        for (k, v) in extra {
            fields.push((k.to_string(), v.to_string()));
        }
        for (k, v) in &self.profile.signin_fields {
            fields.push((k.clone(), v.clone()));
        }
        self.update_signin_parameters(&mut fields);
        fields
    }
}

fn login_error(step: &LoginStep) -> IdentityError {
    IdentityError::Security(
        step.error_message()
            .unwrap_or_else(|| "Login failed".to_string()),
    )
}

fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, sep, query)
}

#[async_trait]
impl BrandAuthenticator for WebLoginAuthenticator {
    fn profile(&self) -> &BrandProfile {
        &self.profile
    }

    fn new_flow(&self, http: ApiHttpClient) -> OAuthFlow {
        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), self.profile.user_agent.clone());
        headers.insert("Accept".to_string(), ACCEPT_HTML.to_string());
        OAuthFlow::new(http).with_headers(headers)
    }

    async fn login_url(&self, flow: &mut OAuthFlow) -> Result<String> {
        let p = &self.profile;
        if p.authorize_url.is_empty() {
            return Err(IdentityError::Configuration(format!(
                "No authorize URL configured for brand {}",
                p.brand
            )));
        }

        let state = generate_state();
        let nonce = generate_nonce();
        flow.set_field("state", state.clone());
        flow.set_field("nonce", nonce.clone());

        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", p.client_id.as_str()),
            ("redirect_uri", p.redirect_uri.as_str()),
            ("response_type", p.response_type.as_str()),
            ("scope", p.scope.as_str()),
            ("state", state.as_str()),
            ("nonce", nonce.as_str()),
        ];

        let pkce = p.use_pkce.then(PkceChallenge::generate);
        if let Some(pkce) = &pkce {
            params.push(("code_challenge", pkce.challenge.as_str()));
            params.push(("code_challenge_method", PkceChallenge::METHOD));
        }
        for (k, v) in &p.authorize_params {
            params.push((k.as_str(), v.as_str()));
        }

        let url = append_query(&p.authorize_url, &params);
        flow.pkce = pkce;
        Ok(self.update_authorization_url(url))
    }

    async fn login(
        &self,
        url: &str,
        flow: &mut OAuthFlow,
        credentials: &Credentials,
    ) -> Result<OAuthToken> {
        flow.get(url).await?;
        if self.follow_redirects(flow).await? {
            tracing::debug!("session still signed in, login form skipped");
            return Ok(flow.token());
        }

        // Identifier page
        flow.absorb_html();
        let identifier_action = scrape::form_action(flow.body(), "emailPasswordForm")
            .ok_or_else(|| {
                IdentityError::Security("Login failed, sign-in form not found".to_string())
            })?;
        let fields = self.signin_fields(flow, &[("email", credentials.username.as_str())]);
        flow.post_form(&identifier_action, fields).await?;
        let identifier_url = flow.url().to_string();
        if self.follow_redirects(flow).await? {
            return Ok(flow.token());
        }

        // Password page
        flow.absorb_html();
        let authenticate_action = scrape::form_action(flow.body(), "credentialsForm")
            .unwrap_or_else(|| identifier_url.replace("/identifier", "/authenticate"));
        let fields = self.signin_fields(
            flow,
            &[
                ("email", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ],
        );
        flow.post_form(&authenticate_action, fields).await?;

        if !self.follow_redirects(flow).await? {
            return Err(IdentityError::Security(
                "Login failed, no redirect after authentication".to_string(),
            ));
        }

        let token = flow.token();
        if token.is_empty() && token.code.is_none() {
            return Err(IdentityError::Security(
                "Login failed, redirect carried no token".to_string(),
            ));
        }
        Ok(token)
    }

    async fn grant_access(&self, flow: &mut OAuthFlow) -> Result<OAuthToken> {
        let p = &self.profile;
        match p.token_exchange {
            TokenExchange::Identity => Ok(flow.token()),
            TokenExchange::IdToken => {
                let id_token = flow.require("id_token")?.to_string();
                let form = HttpBody::form([
                    ("grant_type", "id_token"),
                    ("token", id_token.as_str()),
                    ("scope", p.token_scope.as_str()),
                ]);
                self.post_token(flow.http(), &p.token_url, form).await
            }
            TokenExchange::AuthorizationCode => {
                let code = flow.require("code")?.to_string();
                let mut form = vec![
                    ("grant_type".to_string(), "authorization_code".to_string()),
                    ("code".to_string(), code),
                    ("redirect_uri".to_string(), p.redirect_uri.clone()),
                    ("client_id".to_string(), p.client_id.clone()),
                ];
                if let Some(pkce) = &flow.pkce {
                    form.push(("code_verifier".to_string(), pkce.verifier.clone()));
                }
                self.post_token(flow.http(), &p.token_url, HttpBody::Form(form))
                    .await
            }
        }
    }

    async fn refresh_token(&self, http: &ApiHttpClient, token: &ApiToken) -> Result<OAuthToken> {
        let p = &self.profile;
        let form = match p.token_exchange {
            TokenExchange::IdToken => HttpBody::form([
                ("grant_type", "refresh_token"),
                ("token", token.refresh_token.as_str()),
                ("scope", p.token_scope.as_str()),
            ]),
            _ => HttpBody::form([
                ("grant_type", "refresh_token"),
                ("refresh_token", token.refresh_token.as_str()),
                ("client_id", p.client_id.as_str()),
            ]),
        };
        self.post_token(http, &p.refresh_url, form).await
    }
}
