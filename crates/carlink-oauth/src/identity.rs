//! Identity manager: the single authority for producing and refreshing
//! tokens.
//!
//! Tokens are cached per session group. A session group is shared by one
//! account and all vehicles under it, so one login serves every vehicle.
//! Each group owns its own HTTP transport and with it the cookie jar of the
//! identity provider session.
//!
//! Concurrent refreshes of the same group are not serialized: two callers
//! may both refresh, and the later whole-value update wins.

use std::collections::HashMap;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use carlink_client::{ApiHttpClient, Headers, HttpBody};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use sha2::{Digest, Sha512};

use crate::context::ApiContext;
use crate::error::{IdentityError, Result};
use crate::token::{ApiToken, OAuthToken, TokenInfo};

/// Default transport timeout for new session groups.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a complete web login.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(90);

// ============================================================================
// TokenSet
// ============================================================================

/// Tokens and transport of one authentication session.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access: ApiToken,
    pub identity: ApiToken,
    pub http: ApiHttpClient,
}

impl TokenSet {
    pub fn new(http: ApiHttpClient) -> Self {
        Self {
            access: ApiToken::default(),
            identity: ApiToken::default(),
            http,
        }
    }

    /// Access token string, falling back to the identity grant.
    fn access_string(&self) -> Option<String> {
        [&self.access.access_token, &self.identity.access_token]
            .into_iter()
            .find(|t| !t.is_empty())
            .cloned()
    }
}

// ============================================================================
// PIN exchange DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PinAuthInfoResponse {
    security_pin_auth_info: PinAuthInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PinAuthInfo {
    security_token: String,
    security_pin_transmission: PinTransmission,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PinTransmission {
    challenge: String,
}

/// SHA-512 of the PIN followed by the challenge, as upper-case hex.
pub fn pin_hash(pin: &str, challenge: &str) -> String {
    let salted = format!("{}{}", pin, challenge);
    hex::encode_upper(Sha512::digest(salted.as_bytes()))
}

/// `sub` claim of a JWT, without signature verification.
pub fn jwt_subject(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("sub")?.as_str().map(String::from)
}

// ============================================================================
// IdentityManager
// ============================================================================

/// Owner of all session groups and security tokens.
#[derive(Debug)]
pub struct IdentityManager {
    sets: DashMap<String, TokenSet>,
    security: Mutex<HashMap<String, Vec<ApiToken>>>,
    http_timeout: Duration,
    login_timeout: Duration,
}

impl Default for IdentityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityManager {
    pub fn new() -> Self {
        Self {
            sets: DashMap::new(),
            security: Mutex::new(HashMap::new()),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    /// Transport timeout for session groups created afterwards.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    // ────────────────────────────────────────────────────────────────────────
    // Session groups
    // ────────────────────────────────────────────────────────────────────────

    /// Register an empty token set with a fresh transport.
    pub fn generate_session_group(&self) -> Result<String> {
        let http = ApiHttpClient::builder()
            .timeout(self.http_timeout)
            .build()?;
        let id = uuid::Uuid::new_v4().to_string();
        self.sets.insert(id.clone(), TokenSet::new(http));
        tracing::debug!(group = %id, "session group created");
        Ok(id)
    }

    /// Copy of a group's token set.
    pub fn token_set(&self, group_id: &str) -> Result<TokenSet> {
        self.sets
            .get(group_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown_group(group_id))
    }

    /// Replace a group's token set.
    pub fn update_token_set(&self, group_id: &str, set: TokenSet) -> Result<()> {
        if !self.sets.contains_key(group_id) {
            return Err(unknown_group(group_id));
        }
        self.sets.insert(group_id.to_string(), set);
        Ok(())
    }

    pub fn session_groups(&self) -> Vec<String> {
        self.sets.iter().map(|e| e.key().clone()).collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Token creation
    // ────────────────────────────────────────────────────────────────────────

    /// Valid access token, from cache, refresh or a full login.
    pub async fn create_access_token(&self, ctx: &ApiContext) -> Result<String> {
        let mut set = self.token_set(&ctx.group_id)?;
        if set.access.is_usable()
            && let Some(token) = set.access_string()
        {
            return Ok(token);
        }

        if set.access.is_valid() || set.access.has_refresh_token() {
            let mut access = set.access.clone();
            self.refresh_token(ctx, &set, &mut access).await;
            if access.is_valid() {
                set.access = access;
                self.update_token_set(&ctx.group_id, set.clone())?;
                if let Some(token) = set.access_string() {
                    return Ok(token);
                }
            }
        }

        self.login(ctx, &mut set).await?;
        self.update_token_set(&ctx.group_id, set.clone())?;
        set.access_string()
            .ok_or_else(|| IdentityError::Security("Login returned no access token".to_string()))
    }

    /// Identity token, re-running the login when it is no longer usable.
    pub async fn create_id_token(&self, ctx: &ApiContext) -> Result<String> {
        let mut set = self.token_set(&ctx.group_id)?;
        if set.identity.is_usable() && !set.identity.id_token.is_empty() {
            return Ok(set.identity.id_token);
        }

        // Drop the access grant so the next call logs in again.
        set.access = ApiToken::default();
        self.update_token_set(&ctx.group_id, set)?;
        self.create_access_token(ctx).await?;

        let set = self.token_set(&ctx.group_id)?;
        if set.identity.id_token.is_empty() {
            return Err(IdentityError::Security(
                "Login returned no identity token".to_string(),
            ));
        }
        Ok(set.identity.id_token)
    }

    /// Access token of the identity grant, used for profile calls.
    pub async fn create_profile_token(&self, ctx: &ApiContext) -> Result<String> {
        self.create_id_token(ctx).await?;
        let set = self.token_set(&ctx.group_id)?;
        if set.identity.access_token.is_empty() {
            return Err(IdentityError::Security(
                "Login returned no profile token".to_string(),
            ));
        }
        Ok(set.identity.access_token)
    }

    /// Subject of the identity token.
    pub async fn user_identity(&self, ctx: &ApiContext) -> Result<String> {
        let id_token = self.create_id_token(ctx).await?;
        jwt_subject(&id_token)
            .ok_or_else(|| IdentityError::Api("Identity token carries no subject".to_string()))
    }

    async fn login(&self, ctx: &ApiContext, set: &mut TokenSet) -> Result<()> {
        let auth = ctx.authenticator.as_ref().ok_or_else(|| {
            IdentityError::Configuration(format!(
                "No authenticator configured for brand {}",
                ctx.profile.brand
            ))
        })?;

        tracing::info!(group = %ctx.group_id, brand = %ctx.profile.brand, "logging in");
        let mut flow = auth.new_flow(set.http.clone());
        let url = auth.login_url(&mut flow).await?;
        let login = tokio::time::timeout(
            self.login_timeout,
            auth.login(&url, &mut flow, &ctx.credentials),
        )
        .await
        .map_err(|_| IdentityError::Timeout("Login did not complete in time".to_string()))??;

        let identity = ApiToken::from_oauth(&login, ctx.default_validity_secs);
        let grant = auth.grant_access(&mut flow).await?;
        let access = ApiToken::from_oauth(&grant, ctx.default_validity_secs);

        if !access.is_valid() && !identity.is_valid() {
            return Err(IdentityError::Security(
                "Unable to obtain access or identity token".to_string(),
            ));
        }
        set.identity = identity;
        set.access = access;
        tracing::info!(group = %ctx.group_id, "login successful");
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Security tokens
    // ────────────────────────────────────────────────────────────────────────

    /// Security token for `service.action`, via the S-PIN exchange.
    pub async fn create_security_token(
        &self,
        ctx: &ApiContext,
        service: &str,
        action: &str,
    ) -> Result<String> {
        let pin = ctx
            .credentials
            .pin
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                IdentityError::Security(format!(
                    "No SPIN configured, unable to authorize {}.{}",
                    service, action
                ))
            })?;

        if let Some(cached) = self.security_token(&ctx.group_id, service)
            && cached.is_usable()
        {
            return Ok(cached.security_token);
        }

        let profile = &ctx.profile;
        if !profile.supports_pin() {
            return Err(IdentityError::Configuration(format!(
                "Brand {} does not support the security PIN",
                profile.brand
            )));
        }

        let access_token = self.create_access_token(ctx).await?;
        let set = self.token_set(&ctx.group_id)?;
        let params = ctx.url_params();
        let extra = [("service", service), ("action", action)];

        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), profile.user_agent.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("X-App-Name".to_string(), profile.app_name.clone());
        headers.insert("X-App-Version".to_string(), profile.app_version.clone());
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", access_token),
        );

        let challenge_url = params.url(&profile.api_base_url, &profile.pin_challenge_url, &extra)?;
        tracing::debug!(service, action, "requesting security PIN challenge");
        let res = set.http.get(&challenge_url, &headers).await?;
        let info: PinAuthInfoResponse = serde_json::from_str(&res.body)?;
        let info = info.security_pin_auth_info;
        let challenge = info.security_pin_transmission.challenge;

        let body = serde_json::json!({
            "securityPinAuthentication": {
                "securityPin": {
                    "challenge": challenge,
                    "securityPinHash": pin_hash(pin, &challenge),
                },
                "securityToken": info.security_token,
            }
        });
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let verify_url = params.url(&profile.api_base_url, &profile.pin_verify_url, &extra)?;
        let res = set
            .http
            .post(&verify_url, &headers, HttpBody::Raw(body.to_string()))
            .await?;

        let token = OAuthToken::from_json(&res.body)?
            .security_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                IdentityError::Security(format!(
                    "Unable to create security token for {}.{}",
                    service, action
                ))
            })?;

        self.store_security_token(
            &ctx.group_id,
            ApiToken::security(service, &token, ctx.default_validity_secs),
        );
        tracing::debug!(service, action, "security token granted");
        Ok(token)
    }

    /// Cache a security token, replacing any earlier one for its service.
    pub fn store_security_token(&self, group_id: &str, token: ApiToken) {
        let mut registry = self.security.lock();
        let list = registry.entry(group_id.to_string()).or_default();
        list.retain(|t| t.service != token.service);
        list.push(token);
    }

    fn security_token(&self, group_id: &str, service: &str) -> Option<ApiToken> {
        self.security
            .lock()
            .get(group_id)?
            .iter()
            .find(|t| t.service == service)
            .cloned()
    }

    fn remove_security_token(&self, group_id: &str, service: &str) {
        if let Some(list) = self.security.lock().get_mut(group_id) {
            list.retain(|t| t.service != service);
        }
    }

    /// Cached security tokens of a group.
    pub fn security_tokens(&self, group_id: &str) -> Vec<ApiToken> {
        self.security
            .lock()
            .get(group_id)
            .cloned()
            .unwrap_or_default()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Refresh
    // ────────────────────────────────────────────────────────────────────────

    /// Refresh the access token and drop security tokens that lapsed.
    ///
    /// Returns false only when the pass could not run at all.
    pub async fn refresh_tokens(&self, ctx: &ApiContext) -> bool {
        let mut set = match self.token_set(&ctx.group_id) {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(group = %ctx.group_id, error = %e, "token refresh skipped");
                return false;
            }
        };

        if set.access.is_valid() || set.access.has_refresh_token() {
            let mut access = set.access.clone();
            if !self.refresh_token(ctx, &set, &mut access).await {
                tracing::debug!(group = %ctx.group_id, "access token not refreshed");
            }
            set.access = access;
        }

        for mut token in self.security_tokens(&ctx.group_id) {
            if !self.refresh_token(ctx, &set, &mut token).await {
                tracing::debug!(service = %token.service, "security token expired, removed");
                self.remove_security_token(&ctx.group_id, &token.service);
            }
        }

        self.update_token_set(&ctx.group_id, set).is_ok()
    }

    /// Renew a single token if it is due.
    ///
    /// Returns true when the token is usable afterwards. A failed refresh
    /// keeps the token until its server-side lifetime has passed.
    pub async fn refresh_token(&self, ctx: &ApiContext, set: &TokenSet, token: &mut ApiToken) -> bool {
        if token.is_valid() && !token.is_expired() {
            return true;
        }
        if !token.has_refresh_token() {
            token.invalidate();
            return false;
        }
        let Some(auth) = ctx.authenticator.as_ref() else {
            tracing::warn!(group = %ctx.group_id, "no authenticator, unable to refresh token");
            return false;
        };

        match auth.refresh_token(&set.http, token).await {
            Ok(refreshed) => {
                token.apply_refresh(&refreshed, ctx.default_validity_secs);
                tracing::debug!(group = %ctx.group_id, "token refreshed");
                true
            }
            Err(e) => {
                tracing::warn!(group = %ctx.group_id, error = %e, "token refresh failed");
                if token.is_past_server_expiry() {
                    token.invalidate();
                }
                false
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ────────────────────────────────────────────────────────────────────────

    /// Display snapshots of every token of a group.
    pub fn token_info(&self, group_id: &str) -> Result<Vec<TokenInfo>> {
        let set = self.token_set(group_id)?;
        let mut infos = vec![set.access.info("access"), set.identity.info("identity")];
        infos.extend(
            self.security_tokens(group_id)
                .iter()
                .map(|t| t.info("security")),
        );
        Ok(infos)
    }
}

fn unknown_group(group_id: &str) -> IdentityError {
    IdentityError::Configuration(format!("Unknown session group '{}'", group_id))
}
