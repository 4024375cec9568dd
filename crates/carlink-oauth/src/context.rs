//! Per-vehicle request context.

use std::fmt;
use std::sync::Arc;

use carlink_client::UrlParams;
use carlink_config::BrandProfile;

use crate::authenticator::BrandAuthenticator;

/// Account credentials.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Security PIN (S-PIN), when configured.
    pub pin: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            pin: None,
        }
    }

    pub fn with_pin(mut self, pin: Option<String>) -> Self {
        self.pin = pin.filter(|p| !p.is_empty());
        self
    }

    pub fn has_pin(&self) -> bool {
        self.pin.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("pin", &self.pin.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything the identity layer needs to act for one vehicle.
#[derive(Debug, Clone)]
pub struct ApiContext {
    /// Session group shared by the account and its vehicles.
    pub group_id: String,
    pub credentials: Credentials,
    pub profile: Arc<BrandProfile>,
    pub authenticator: Option<Arc<dyn BrandAuthenticator>>,
    pub vin: String,
    pub country: String,
    /// Subject of the identity token, filled after login.
    pub user_id: String,
    /// Validity used when a server reports no lifetime.
    pub default_validity_secs: i64,
}

impl ApiContext {
    pub fn new(group_id: impl Into<String>, credentials: Credentials, profile: Arc<BrandProfile>) -> Self {
        Self {
            group_id: group_id.into(),
            credentials,
            profile,
            authenticator: None,
            vin: String::new(),
            country: "DE".to_string(),
            user_id: String::new(),
            default_validity_secs: 3600,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn BrandAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn with_vin(mut self, vin: impl Into<String>) -> Self {
        self.vin = vin.into();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_default_validity(mut self, secs: i64) -> Self {
        self.default_validity_secs = secs;
        self
    }

    /// Placeholder values for URL templates.
    pub fn url_params(&self) -> UrlParams {
        UrlParams::new(&self.profile.brand_code, &self.country)
            .with_vin(&self.vin)
            .with_user_id(&self.user_id)
    }
}
