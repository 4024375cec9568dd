//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [account.home]          # login account (brand, user, country)
//! [vehicle.golf]          # vehicle bound to an account
//! [http]                  # transport settings
//! [tokens]                # token validity defaults
//! [actions]               # pending action timeouts
//! [brand.audi]            # brand profile overrides
//! [logging]               # log file settings
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::brand::{Brand, BrandOverride, BrandProfile};
use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CarlinkConfig {
    /// Login accounts by name.
    pub account: HashMap<String, AccountConfig>,

    /// Vehicles by name.
    pub vehicle: HashMap<String, VehicleConfig>,

    /// HTTP transport settings.
    pub http: Option<HttpConfig>,

    /// Token lifetime settings.
    pub tokens: Option<TokenConfig>,

    /// Pending action settings.
    pub actions: Option<ActionConfig>,

    /// Brand profile overrides keyed by brand id.
    pub brand: HashMap<String, BrandOverride>,

    /// Log file settings.
    pub logging: Option<LoggingConfig>,
}

impl CarlinkConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: CarlinkConfig) {
        for (name, account) in other.account {
            self.account.insert(name, account);
        }

        for (name, vehicle) in other.vehicle {
            self.vehicle.insert(name, vehicle);
        }

        if other.http.is_some() {
            self.http = other.http;
        }

        if other.tokens.is_some() {
            self.tokens = other.tokens;
        }

        if other.actions.is_some() {
            self.actions = other.actions;
        }

        for (name, brand) in other.brand {
            self.brand.insert(name, brand);
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Look up an account by name.
    pub fn account(&self, name: &str) -> Result<&AccountConfig> {
        self.account
            .get(name)
            .ok_or_else(|| ConfigError::AccountNotFound {
                name: name.to_string(),
                context: "command line".to_string(),
            })
    }

    /// Name of the only configured account, if there is exactly one.
    pub fn default_account(&self) -> Option<&str> {
        if self.account.len() == 1 {
            self.account.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Look up a vehicle and the account it belongs to.
    pub fn vehicle(&self, name: &str) -> Result<(&VehicleConfig, &AccountConfig)> {
        let vehicle = self
            .vehicle
            .get(name)
            .ok_or_else(|| ConfigError::VehicleNotFound(name.to_string()))?;
        let account =
            self.account
                .get(&vehicle.account)
                .ok_or_else(|| ConfigError::AccountNotFound {
                    name: vehicle.account.clone(),
                    context: format!("vehicle.{}", name),
                })?;
        Ok((vehicle, account))
    }

    /// Vehicles enrolled under an account.
    pub fn vehicles_of(&self, account: &str) -> Vec<(&String, &VehicleConfig)> {
        let mut vehicles: Vec<_> = self
            .vehicle
            .iter()
            .filter(|(_, v)| v.account == account)
            .collect();
        vehicles.sort_by(|a, b| a.0.cmp(b.0));
        vehicles
    }

    /// Built-in profile for a brand with any `[brand.<id>]` override applied.
    pub fn brand_profile(&self, brand: Brand) -> BrandProfile {
        let mut profile = BrandProfile::builtin(brand);
        if let Some(o) = self.brand.get(brand.id()) {
            o.apply(&mut profile);
        }
        profile
    }

    /// HTTP settings, or defaults.
    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    /// Token settings, or defaults.
    pub fn tokens(&self) -> TokenConfig {
        self.tokens.clone().unwrap_or_default()
    }

    /// Action settings, or defaults.
    pub fn actions(&self) -> ActionConfig {
        self.actions.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account / Vehicle
// ─────────────────────────────────────────────────────────────────────────────

/// A login account at a brand's identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub brand: Brand,
    /// Login user (usually the e-mail address).
    pub username: String,
    /// Plaintext password. Prefer the keyring or an env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Country code used for the `{1}` URL placeholder.
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "DE".to_string()
}

impl AccountConfig {
    /// Whether the config carries a plaintext password.
    pub fn has_plaintext_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// A vehicle enrolled under an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Name of the owning `[account.<name>]` section.
    pub account: String,
    pub vin: String,
    /// Security PIN (S-PIN) for privileged actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

impl VehicleConfig {
    /// Whether the config carries a plaintext PIN.
    pub fn has_plaintext_pin(&self) -> bool {
        self.pin.as_deref().is_some_and(|p| !p.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tuning sections
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request-level timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Token lifetime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Validity used when the server reports none.
    pub default_validity_secs: i64,
    /// Interval between refresh passes driven by `actions watch`.
    pub refresh_interval_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_validity_secs: 3600,
            refresh_interval_secs: 300,
        }
    }
}

/// Pending action settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Seconds until an unresolved action request times out.
    pub default_timeout_secs: u64,
    /// Poll interval for `actions watch`.
    pub poll_interval_secs: u64,
    /// Directory of `<function>.json` files served when the API rejects a call.
    pub offline_dir: Option<PathBuf>,
    /// Per-service timeout overrides in seconds.
    pub timeouts: HashMap<String, u64>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            poll_interval_secs: 5,
            offline_dir: None,
            timeouts: HashMap::new(),
        }
    }
}

/// Log file settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log. Defaults to `<config dir>/logs`.
    pub dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClimateBodyFormat;

    const SAMPLE: &str = r#"
[account.home]
brand = "audi"
username = "me@example.com"
country = "AT"

[vehicle.etron]
account = "home"
vin = "WAUZZZGE0MB000001"
pin = "1234"

[actions]
default_timeout_secs = 90

[actions.timeouts]
rclima_v1 = 120

[brand.audi]
climate_body = "json"
"#;

    #[test]
    fn test_parse_sample() {
        let config = CarlinkConfig::from_toml(SAMPLE).unwrap();
        let account = config.account("home").unwrap();
        assert_eq!(account.brand, Brand::Audi);
        assert_eq!(account.country, "AT");
        assert!(!account.has_plaintext_password());

        let (vehicle, owner) = config.vehicle("etron").unwrap();
        assert_eq!(vehicle.pin.as_deref(), Some("1234"));
        assert_eq!(owner.username, "me@example.com");

        let actions = config.actions();
        assert_eq!(actions.default_timeout_secs, 90);
        assert_eq!(actions.timeouts.get("rclima_v1"), Some(&120));
        assert_eq!(actions.poll_interval_secs, 5);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = CarlinkConfig::new();
        assert_eq!(config.http().timeout_secs, 30);
        assert_eq!(config.tokens().default_validity_secs, 3600);
        assert_eq!(config.actions().default_timeout_secs, 60);
        assert!(config.default_account().is_none());
    }

    #[test]
    fn test_country_defaults() {
        let config = CarlinkConfig::from_toml(
            r#"
[account.a]
brand = "volkswagen"
username = "u"
"#,
        )
        .unwrap();
        assert_eq!(config.account("a").unwrap().country, "DE");
        assert_eq!(config.default_account(), Some("a"));
    }

    #[test]
    fn test_brand_profile_override_applied() {
        let config = CarlinkConfig::from_toml(SAMPLE).unwrap();
        let profile = config.brand_profile(Brand::Audi);
        assert_eq!(profile.climate_body, ClimateBodyFormat::Json);
        // brands without a section keep built-ins
        let skoda = config.brand_profile(Brand::Skoda);
        assert_eq!(skoda, BrandProfile::builtin(Brand::Skoda));
    }

    #[test]
    fn test_vehicle_with_unknown_account() {
        let config = CarlinkConfig::from_toml(
            r#"
[vehicle.orphan]
account = "nobody"
vin = "X"
"#,
        )
        .unwrap();
        let err = config.vehicle("orphan").unwrap_err();
        assert!(matches!(err, ConfigError::AccountNotFound { .. }));
        assert!(matches!(
            config.vehicle("missing").unwrap_err(),
            ConfigError::VehicleNotFound(_)
        ));
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = CarlinkConfig::from_toml(SAMPLE).unwrap();
        let top = CarlinkConfig::from_toml(
            r#"
[account.work]
brand = "skoda"
username = "w"

[actions]
default_timeout_secs = 30
"#,
        )
        .unwrap();
        base.merge(top);

        assert_eq!(base.account.len(), 2);
        assert_eq!(base.actions().default_timeout_secs, 30);
        assert!(base.vehicle.contains_key("etron"));
    }

    #[test]
    fn test_vehicles_of_account() {
        let config = CarlinkConfig::from_toml(
            r#"
[account.a]
brand = "seat"
username = "u"

[vehicle.one]
account = "a"
vin = "1"

[vehicle.two]
account = "a"
vin = "2"

[vehicle.other]
account = "b"
vin = "3"
"#,
        )
        .unwrap();
        let names: Vec<_> = config
            .vehicles_of("a")
            .into_iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn test_toml_roundtrip_keeps_accounts() {
        let config = CarlinkConfig::from_toml(SAMPLE).unwrap();
        let text = config.to_toml().unwrap();
        let back = CarlinkConfig::from_toml(&text).unwrap();
        assert_eq!(back.account("home").unwrap().username, "me@example.com");
    }
}
