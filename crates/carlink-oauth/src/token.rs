//! Token model.
//!
//! [`OAuthToken`] is the wire shape returned by token endpoints and login
//! redirects. [`ApiToken`] is the cached form with creation time and a
//! validity window that renews 20 % before the server-reported expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Validity sentinel for a token that was never obtained.
pub const NEVER_OBTAINED: i64 = -1;

// ============================================================================
// OAuthToken
// ============================================================================

/// Token endpoint / redirect payload. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthToken {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(
        rename = "securityToken",
        alias = "security_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub security_token: Option<String>,
}

/// Accept `expires_in` as a number or a numeric string.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl OAuthToken {
    /// Parse a token endpoint response body.
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Build from key/value pairs collected during a login redirect chain.
    pub fn from_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut token = OAuthToken::default();
        for (key, value) in fields {
            let value = Some(value.to_string());
            match key {
                "access_token" => token.access_token = value,
                "id_token" => token.id_token = value,
                "refresh_token" => token.refresh_token = value,
                "token_type" => token.token_type = value,
                "expires_in" => token.expires_in = value.and_then(|v| v.parse().ok()),
                "scope" => token.scope = value,
                "state" => token.state = value,
                "code" => token.code = value,
                "securityToken" | "security_token" => token.security_token = value,
                _ => {}
            }
        }
        token
    }

    /// True when neither an access nor an identity token is present.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.access_token).is_none() && non_empty(&self.id_token).is_none()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ============================================================================
// ApiToken
// ============================================================================

/// Cached token with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToken {
    pub access_token: String,
    pub id_token: String,
    pub security_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Service a security token was granted for.
    pub service: String,
    pub created_at: DateTime<Utc>,
    /// Validity window in seconds, margin already deducted.
    validity_secs: i64,
    /// Lifetime as reported by the server.
    server_expires_in: i64,
}

impl Default for ApiToken {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            id_token: String::new(),
            security_token: String::new(),
            refresh_token: String::new(),
            token_type: String::new(),
            service: String::new(),
            created_at: Utc::now(),
            validity_secs: NEVER_OBTAINED,
            server_expires_in: NEVER_OBTAINED,
        }
    }
}

impl ApiToken {
    /// Token built from a token endpoint response.
    pub fn from_oauth(token: &OAuthToken, default_validity: i64) -> Self {
        let mut api = ApiToken {
            access_token: token.access_token.clone().unwrap_or_default(),
            id_token: token.id_token.clone().unwrap_or_default(),
            security_token: token.security_token.clone().unwrap_or_default(),
            refresh_token: token.refresh_token.clone().unwrap_or_default(),
            token_type: token.token_type.clone().unwrap_or_default(),
            ..Default::default()
        };
        api.set_validity(token.expires_in.unwrap_or(0), default_validity);
        api
    }

    /// Security token granted for `service`.
    pub fn security(service: &str, token: &str, default_validity: i64) -> Self {
        let mut api = ApiToken {
            security_token: token.to_string(),
            service: service.to_string(),
            ..Default::default()
        };
        api.set_validity(0, default_validity);
        api
    }

    /// Store the server lifetime, less the 20 % renewal margin.
    ///
    /// Non-positive values fall back to `default_validity`, stored unchanged.
    pub fn set_validity(&mut self, expires_in: i64, default_validity: i64) {
        if expires_in <= 0 {
            self.validity_secs = default_validity;
            self.server_expires_in = default_validity;
        } else {
            self.validity_secs = expires_in - expires_in / 5;
            self.server_expires_in = expires_in;
        }
    }

    pub fn validity_secs(&self) -> i64 {
        self.validity_secs
    }

    pub fn server_expires_in(&self) -> i64 {
        self.server_expires_in
    }

    /// At least one token string present and a validity was set.
    pub fn is_valid(&self) -> bool {
        (!self.access_token.is_empty()
            || !self.id_token.is_empty()
            || !self.security_token.is_empty())
            && self.validity_secs != NEVER_OBTAINED
    }

    /// Validity window (with margin) has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.age_secs(now) > self.validity_secs
    }

    /// Server lifetime (without margin) has elapsed.
    pub fn is_past_server_expiry(&self) -> bool {
        self.age_secs(Utc::now()) > self.server_expires_in
    }

    /// Valid and not yet due for renewal.
    pub fn is_usable(&self) -> bool {
        self.is_valid() && !self.is_expired()
    }

    /// Seconds until the renewal point, zero once passed.
    pub fn remaining_secs(&self) -> u64 {
        let left = self.validity_secs - self.age_secs(Utc::now());
        u64::try_from(left).unwrap_or(0)
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Drop all token material; the token reads as never obtained.
    pub fn invalidate(&mut self) {
        self.access_token.clear();
        self.id_token.clear();
        self.security_token.clear();
        self.validity_secs = NEVER_OBTAINED;
        self.server_expires_in = NEVER_OBTAINED;
    }

    /// Apply a refresh response.
    ///
    /// Fields the response omits keep their previous values, which matters
    /// for the refresh token: servers often do not rotate it.
    pub fn apply_refresh(&mut self, token: &OAuthToken, default_validity: i64) {
        if let Some(v) = non_empty(&token.access_token) {
            self.access_token = v.to_string();
        }
        if let Some(v) = non_empty(&token.id_token) {
            self.id_token = v.to_string();
        }
        if let Some(v) = non_empty(&token.refresh_token) {
            self.refresh_token = v.to_string();
        }
        if let Some(v) = non_empty(&token.token_type) {
            self.token_type = v.to_string();
        }
        self.created_at = Utc::now();
        self.set_validity(token.expires_in.unwrap_or(0), default_validity);
    }

    fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    /// Snapshot for display.
    pub fn info(&self, kind: &str) -> TokenInfo {
        TokenInfo {
            kind: kind.to_string(),
            service: (!self.service.is_empty()).then(|| self.service.clone()),
            created_at: self.created_at,
            expires_in_secs: self.remaining_secs(),
            is_valid: self.is_valid(),
            is_expired: self.is_expired(),
            has_refresh_token: self.has_refresh_token(),
        }
    }
}

// ============================================================================
// TokenInfo
// ============================================================================

/// Information about a cached token for display.
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_in_secs: u64,
    pub is_valid: bool,
    pub is_expired: bool,
    pub has_refresh_token: bool,
}

impl TokenInfo {
    pub fn expires_in_display(&self) -> String {
        if !self.is_valid {
            "Not obtained".to_string()
        } else if self.is_expired {
            "Expired (will refresh on next use)".to_string()
        } else {
            let hours = self.expires_in_secs / 3600;
            let minutes = (self.expires_in_secs % 3600) / 60;
            format!("{}h {}m", hours, minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: i64) -> ApiToken {
        ApiToken::from_oauth(
            &OAuthToken {
                access_token: Some("acc".into()),
                refresh_token: Some("ref".into()),
                expires_in: Some(expires_in),
                ..Default::default()
            },
            3600,
        )
    }

    #[test]
    fn test_set_validity_applies_margin() {
        let mut t = ApiToken::default();
        t.set_validity(3600, 1000);
        assert_eq!(t.validity_secs(), 2880);
        assert_eq!(t.server_expires_in(), 3600);

        t.set_validity(7, 1000);
        assert_eq!(t.validity_secs(), 6);
    }

    #[test]
    fn test_set_validity_default_is_unreduced() {
        let mut t = ApiToken::default();
        t.set_validity(0, 1000);
        assert_eq!(t.validity_secs(), 1000);
        t.set_validity(-5, 1000);
        assert_eq!(t.validity_secs(), 1000);
    }

    #[test]
    fn test_validity_requires_token_and_window() {
        assert!(!ApiToken::default().is_valid());

        let mut t = ApiToken {
            id_token: "id".into(),
            ..Default::default()
        };
        assert!(!t.is_valid());
        t.set_validity(60, 3600);
        assert!(t.is_valid());

        let security = ApiToken::security("rlu_v1", "sec", 3600);
        assert!(security.is_valid());
        assert_eq!(security.service, "rlu_v1");
    }

    #[test]
    fn test_expiry_uses_margin() {
        let mut t = token(100);
        assert_eq!(t.validity_secs(), 80);
        assert!(!t.is_expired());

        t.created_at = Utc::now() - Duration::seconds(81);
        assert!(t.is_expired());
        assert!(!t.is_past_server_expiry());

        t.created_at = Utc::now() - Duration::seconds(101);
        assert!(t.is_past_server_expiry());
        assert_eq!(t.remaining_secs(), 0);
    }

    #[test]
    fn test_invalidate() {
        let mut t = token(3600);
        t.invalidate();
        assert!(!t.is_valid());
        assert!(t.access_token.is_empty());
        assert!(t.has_refresh_token());
    }

    #[test]
    fn test_refresh_keeps_refresh_token() {
        let mut t = token(3600);
        t.apply_refresh(
            &OAuthToken {
                access_token: Some("acc2".into()),
                expires_in: Some(600),
                ..Default::default()
            },
            3600,
        );
        assert_eq!(t.access_token, "acc2");
        assert_eq!(t.refresh_token, "ref");
        assert_eq!(t.validity_secs(), 480);

        t.apply_refresh(
            &OAuthToken {
                access_token: Some("acc3".into()),
                refresh_token: Some("ref2".into()),
                ..Default::default()
            },
            3600,
        );
        assert_eq!(t.refresh_token, "ref2");
        assert_eq!(t.validity_secs(), 3600);
    }

    #[test]
    fn test_oauth_token_parsing() {
        let t = OAuthToken::from_json(
            r#"{"access_token":"a","token_type":"bearer","expires_in":"3600","scope":"sc2:fal"}"#,
        )
        .unwrap();
        assert_eq!(t.expires_in, Some(3600));
        assert!(!t.is_empty());

        let sec = OAuthToken::from_json(r#"{"securityToken":"s"}"#).unwrap();
        assert_eq!(sec.security_token.as_deref(), Some("s"));
        assert!(sec.is_empty());
    }

    #[test]
    fn test_oauth_token_from_fields() {
        let t = OAuthToken::from_fields([
            ("id_token", "eyJ"),
            ("expires_in", "3600"),
            ("state", "s"),
            ("other", "x"),
        ]);
        assert_eq!(t.id_token.as_deref(), Some("eyJ"));
        assert_eq!(t.expires_in, Some(3600));
        assert_eq!(t.state.as_deref(), Some("s"));
    }

    #[test]
    fn test_token_info_display() {
        let info = token(7200).info("access");
        assert!(info.expires_in_display().ends_with('m'));

        let never = ApiToken::default().info("identity");
        assert_eq!(never.expires_in_display(), "Not obtained");

        let mut expired = token(10);
        expired.created_at = Utc::now() - Duration::seconds(60);
        assert!(
            expired
                .info("access")
                .expires_in_display()
                .contains("Expired")
        );
    }
}
