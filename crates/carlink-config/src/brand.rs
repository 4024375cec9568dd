//! Brand profiles: the static per-brand tables of URL templates, client ids
//! and header values consumed by the identity and action layers.
//!
//! Brand differences are data. The only control-flow divergences a profile
//! selects are the token exchange style ([`TokenExchange`]) and the climate
//! request body layout ([`ClimateBodyFormat`]).
//!
//! URL templates use positional placeholders `{0}` (brand code), `{1}`
//! (country), `{2}` (VIN) and `{3}` (user id). PIN templates additionally use
//! `{service}` / `{action}`, status templates use `{requestId}`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported vehicle brands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Volkswagen,
    Audi,
    Seat,
    Skoda,
    WeConnect,
    WeCharge,
    FordPass,
}

impl Brand {
    /// All brands with a built-in profile.
    pub const ALL: [Brand; 7] = [
        Brand::Volkswagen,
        Brand::Audi,
        Brand::Seat,
        Brand::Skoda,
        Brand::WeConnect,
        Brand::WeCharge,
        Brand::FordPass,
    ];

    /// Lowercase identifier used in config files and `[brand.<id>]` sections.
    pub fn id(&self) -> &'static str {
        match self {
            Brand::Volkswagen => "volkswagen",
            Brand::Audi => "audi",
            Brand::Seat => "seat",
            Brand::Skoda => "skoda",
            Brand::WeConnect => "weconnect",
            Brand::WeCharge => "wecharge",
            Brand::FordPass => "fordpass",
        }
    }

    /// Suffix used for the password/PIN environment variable fallback.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Brand::Volkswagen => "VW",
            Brand::Audi => "AUDI",
            Brand::Seat => "SEAT",
            Brand::Skoda => "SKODA",
            Brand::WeConnect => "WECONNECT",
            Brand::WeCharge => "WECHARGE",
            Brand::FordPass => "FORDPASS",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Brand::ALL
            .into_iter()
            .find(|b| b.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown brand '{}'", s))
    }
}

/// How the login identity is turned into an API access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenExchange {
    /// POST `grant_type=id_token` with the identity token (MBB style).
    #[default]
    IdToken,
    /// Standard authorization-code grant, optionally with PKCE verifier.
    AuthorizationCode,
    /// The login identity already is the access grant; no exchange call.
    Identity,
}

/// Body layout for climatisation start requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateBodyFormat {
    /// Minimal XML action without heater source.
    XmlV1,
    /// XML action carrying the heater source setting.
    XmlV2,
    /// JSON action (`ClimaterAction_v1_0_2`).
    #[default]
    Json,
}

/// Static per-brand configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    pub brand: Brand,
    /// Value for the `{0}` placeholder.
    pub brand_code: String,
    /// Base URL that relative API templates are resolved against.
    pub api_base_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub refresh_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub response_type: String,
    /// Scope sent with the `id_token` grant.
    pub token_scope: String,
    pub use_pkce: bool,
    pub token_exchange: TokenExchange,
    pub user_agent: String,
    pub app_name: String,
    pub app_version: String,
    /// Extra headers sent on token endpoint calls.
    pub token_headers: BTreeMap<String, String>,
    /// Extra query parameters appended to the authorize URL.
    pub authorize_params: BTreeMap<String, String>,
    /// Extra form fields added to the sign-in POSTs.
    pub signin_fields: BTreeMap<String, String>,
    pub pin_challenge_url: String,
    pub pin_verify_url: String,
    /// Action endpoint per service id.
    pub action_urls: BTreeMap<String, String>,
    /// Request status endpoint per service id.
    pub status_urls: BTreeMap<String, String>,
    pub climate_body: ClimateBodyFormat,
}

const VWG_IDENTITY_AUTHORIZE: &str = "https://identity.vwgroup.io/oidc/v1/authorize";
const MBB_TOKEN_URL: &str = "https://mbboauth-1d.prd.ece.vwg-connect.com/mbbcoauth/mobile/oauth2/v1/token";
const MBB_API_BASE: &str = "https://msg.volkswagen.de/fs-car/";
const MBB_PIN_CHALLENGE: &str = "https://mal-1a.prd.ece.vwg-connect.com/api/rolesrights/authorization/v2/vehicles/{2}/services/{service}/operations/{action}/security-pin-auth-requested";
const MBB_PIN_VERIFY: &str = "https://mal-1a.prd.ece.vwg-connect.com/api/rolesrights/authorization/v2/security-pin-auth-completed";
const MBB_USER_AGENT: &str = "okhttp/3.11.0";

fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn mbb_action_urls() -> BTreeMap<String, String> {
    map(&[
        ("rlu_v1", "bs/rlu/v1/{0}/{1}/vehicles/{2}/actions"),
        ("rclima_v1", "bs/climatisation/v1/{0}/{1}/vehicles/{2}/climater/actions"),
        ("rheating_v1", "bs/rs/v1/{0}/{1}/vehicles/{2}/climater/actions"),
        ("rbatterycharge_v1", "bs/batterycharge/v1/{0}/{1}/vehicles/{2}/charger/actions"),
        ("rhonk_v1", "bs/rhf/v1/{0}/{1}/vehicles/{2}/honkAndFlash"),
        ("statusreport_v1", "bs/vsr/v1/{0}/{1}/vehicles/{2}/requests"),
    ])
}

fn mbb_status_urls() -> BTreeMap<String, String> {
    map(&[
        ("rlu_v1", "bs/rlu/v1/{0}/{1}/vehicles/{2}/requests/{requestId}/status"),
        ("rclima_v1", "bs/climatisation/v1/{0}/{1}/vehicles/{2}/climater/actions/{requestId}"),
        ("rheating_v1", "bs/rs/v1/{0}/{1}/vehicles/{2}/requests/{requestId}/status"),
        ("rbatterycharge_v1", "bs/batterycharge/v1/{0}/{1}/vehicles/{2}/charger/actions/{requestId}"),
        ("rhonk_v1", "bs/rhf/v1/{0}/{1}/vehicles/{2}/honkAndFlash/{requestId}/status"),
        ("statusreport_v1", "bs/vsr/v1/{0}/{1}/vehicles/{2}/requests/{requestId}/jobstatus"),
    ])
}

impl BrandProfile {
    /// MBB-backed profile shared by the VW group brands.
    fn mbb(
        brand: Brand,
        brand_code: &str,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        app_name: &str,
        app_version: &str,
    ) -> Self {
        Self {
            brand,
            brand_code: brand_code.to_string(),
            api_base_url: MBB_API_BASE.to_string(),
            authorize_url: VWG_IDENTITY_AUTHORIZE.to_string(),
            token_url: MBB_TOKEN_URL.to_string(),
            refresh_url: MBB_TOKEN_URL.to_string(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            response_type: "code id_token token".to_string(),
            token_scope: "sc2:fal".to_string(),
            use_pkce: false,
            token_exchange: TokenExchange::IdToken,
            user_agent: MBB_USER_AGENT.to_string(),
            app_name: app_name.to_string(),
            app_version: app_version.to_string(),
            token_headers: map(&[("X-Client-Id", client_id)]),
            authorize_params: BTreeMap::new(),
            signin_fields: BTreeMap::new(),
            pin_challenge_url: MBB_PIN_CHALLENGE.to_string(),
            pin_verify_url: MBB_PIN_VERIFY.to_string(),
            action_urls: mbb_action_urls(),
            status_urls: mbb_status_urls(),
            climate_body: ClimateBodyFormat::Json,
        }
    }

    /// Built-in profile for a brand.
    pub fn builtin(brand: Brand) -> Self {
        match brand {
            Brand::Volkswagen => Self::mbb(
                brand,
                "VW",
                "9496332b-ea03-4091-a224-8c746b885068@apps_vw-dilab_com",
                "carnet://identity-kit/login",
                "openid profile mbb cars birthdate nickname address phone",
                "eRemote",
                "5.1.2",
            ),
            Brand::Audi => {
                let mut p = Self::mbb(
                    brand,
                    "Audi",
                    "09b6cbec-cd19-4589-82fd-363dfa8c24da@apps_vw-dilab_com",
                    "myaudi:///",
                    "address profile badge birthdate birthplace nationalIdentifier nationality profession email vin phone nickname name picture mbb gallery openid",
                    "myAudi",
                    "3.22.0",
                );
                p.response_type = "token id_token".to_string();
                p.use_pkce = true;
                p.climate_body = ClimateBodyFormat::XmlV2;
                p
            }
            Brand::Seat => {
                let mut p = Self::mbb(
                    brand,
                    "SEAT",
                    "50f215ac-4444-4230-9fb1-fe15cd1a9dcc@apps_vw-dilab_com",
                    "seatconnect://identity-kit/login",
                    "openid profile mbb",
                    "SEATConnect",
                    "1.1.29",
                );
                p.climate_body = ClimateBodyFormat::XmlV1;
                p
            }
            Brand::Skoda => {
                let mut p = Self::mbb(
                    brand,
                    "skoda",
                    "7f045eee-7003-4379-9968-9355ed2adb06@apps_vw-dilab_com",
                    "skodaconnect://oidc.login/",
                    "openid profile phone address cars email birthdate badge dealers driversLicense mbb",
                    "SkodaConnect",
                    "3.2.6",
                );
                p.climate_body = ClimateBodyFormat::XmlV1;
                p
            }
            Brand::WeConnect => {
                let mut p = Self::mbb(
                    brand,
                    "VW",
                    "a24fba63-34b3-4d43-b181-942111e6bda8@apps_vw-dilab_com",
                    "weconnect://authenticated",
                    "openid profile badge cars dealers vin",
                    "WeConnect",
                    "1.0.0",
                );
                p.api_base_url = "https://mobileapi.apps.emea.vwapps.io/".to_string();
                p.token_exchange = TokenExchange::Identity;
                p.action_urls.clear();
                p.status_urls.clear();
                p
            }
            Brand::WeCharge => {
                let mut p = Self::mbb(
                    brand,
                    "VW",
                    "0fa5ae01-ebc0-4901-a2aa-4dd60572ea0e@apps_vw-dilab_com",
                    "wecharge://authenticated",
                    "openid profile address email cars vin",
                    "WeCharge",
                    "1.0.0",
                );
                p.api_base_url = "https://wecharge.apps.emea.vwapps.io/".to_string();
                p.token_exchange = TokenExchange::Identity;
                p.action_urls.clear();
                p.status_urls.clear();
                p
            }
            Brand::FordPass => Self {
                brand,
                brand_code: "Ford".to_string(),
                api_base_url: "https://usapi.cv.ford.com/api/".to_string(),
                authorize_url: "https://sso.ci.ford.com/v1.0/endpoint/default/authorize".to_string(),
                token_url: "https://sso.ci.ford.com/oidc/endpoint/default/token".to_string(),
                refresh_url: "https://sso.ci.ford.com/oidc/endpoint/default/token".to_string(),
                client_id: "9fb503e0-715b-47e8-adfd-ad4b7770f73b".to_string(),
                redirect_uri: "fordapp://userauthorized".to_string(),
                scope: "openid".to_string(),
                response_type: "code".to_string(),
                token_scope: String::new(),
                use_pkce: true,
                token_exchange: TokenExchange::AuthorizationCode,
                user_agent: "FordPass/5 CFNetwork/1327.0.4 Darwin/21.2.0".to_string(),
                app_name: "FordPass".to_string(),
                app_version: "4.14.0".to_string(),
                token_headers: map(&[("Application-Id", "71A3AD0A-CF46-4CCF-B473-FC7FE5BC4592")]),
                authorize_params: BTreeMap::new(),
                signin_fields: BTreeMap::new(),
                pin_challenge_url: String::new(),
                pin_verify_url: String::new(),
                action_urls: BTreeMap::new(),
                status_urls: BTreeMap::new(),
                climate_body: ClimateBodyFormat::Json,
            },
        }
    }

    /// Host part of the API base URL, for the `Host` header.
    pub fn api_host(&self) -> &str {
        let rest = self
            .api_base_url
            .split_once("//")
            .map(|(_, r)| r)
            .unwrap_or(&self.api_base_url);
        rest.split('/').next().unwrap_or(rest)
    }

    /// Whether the profile supports the security PIN exchange.
    pub fn supports_pin(&self) -> bool {
        !self.pin_challenge_url.is_empty() && !self.pin_verify_url.is_empty()
    }
}

/// Partial profile from a `[brand.<id>]` config section.
///
/// Only set fields replace the built-in values; map fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandOverride {
    pub api_base_url: Option<String>,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub response_type: Option<String>,
    pub use_pkce: Option<bool>,
    pub token_exchange: Option<TokenExchange>,
    pub app_version: Option<String>,
    pub pin_challenge_url: Option<String>,
    pub pin_verify_url: Option<String>,
    pub climate_body: Option<ClimateBodyFormat>,
    pub authorize_params: BTreeMap<String, String>,
    pub signin_fields: BTreeMap<String, String>,
    pub status_urls: BTreeMap<String, String>,
    pub action_urls: BTreeMap<String, String>,
}

impl BrandOverride {
    /// Apply this override on top of a profile.
    pub fn apply(&self, profile: &mut BrandProfile) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut profile.api_base_url, &self.api_base_url);
        set(&mut profile.authorize_url, &self.authorize_url);
        set(&mut profile.token_url, &self.token_url);
        set(&mut profile.refresh_url, &self.refresh_url);
        set(&mut profile.client_id, &self.client_id);
        set(&mut profile.redirect_uri, &self.redirect_uri);
        set(&mut profile.scope, &self.scope);
        set(&mut profile.response_type, &self.response_type);
        set(&mut profile.use_pkce, &self.use_pkce);
        set(&mut profile.token_exchange, &self.token_exchange);
        set(&mut profile.app_version, &self.app_version);
        set(&mut profile.pin_challenge_url, &self.pin_challenge_url);
        set(&mut profile.pin_verify_url, &self.pin_verify_url);
        set(&mut profile.climate_body, &self.climate_body);

        profile.authorize_params.extend(self.authorize_params.clone());
        profile.signin_fields.extend(self.signin_fields.clone());
        profile.status_urls.extend(self.status_urls.clone());
        profile.action_urls.extend(self.action_urls.clone());
    }
}
