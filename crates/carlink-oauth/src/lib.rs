//! Token lifecycle for vehicle telematics accounts.
//!
//! Logs in to brand identity providers by emulating the web sign-in, caches
//! access, identity and security tokens per session group and renews them
//! ahead of expiry.
//!
//! # Components
//!
//! - [`identity`]: [`IdentityManager`], session groups and token refresh
//! - [`authenticator`]: [`BrandAuthenticator`] capability and the profile-driven [`WebLoginAuthenticator`]
//! - [`flow`]: [`OAuthFlow`] state of one login attempt
//! - [`scrape`]: login page and redirect location matching
//! - [`token`]: [`ApiToken`] and the [`OAuthToken`] wire shape
//! - [`pkce`]: PKCE challenge, state and nonce generation

pub mod authenticator;
pub mod context;
pub mod error;
pub mod flow;
pub mod identity;
pub mod pkce;
pub mod scrape;
pub mod token;

pub use authenticator::{BrandAuthenticator, SharedAuthenticator, WebLoginAuthenticator};
pub use context::{ApiContext, Credentials};
pub use error::{IdentityError, Result};
pub use flow::OAuthFlow;
pub use identity::{IdentityManager, TokenSet, jwt_subject, pin_hash};
pub use pkce::PkceChallenge;
pub use scrape::LoginStep;
pub use token::{ApiToken, OAuthToken, TokenInfo};
