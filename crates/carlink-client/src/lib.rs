//! HTTP transport for vehicle telematics APIs.
//!
//! The transport performs GET/POST/PUT with caller-supplied headers, detects
//! the request content type from the body shape, never follows redirects on
//! its own and classifies every response:
//!
//! | Status                          | Outcome                              |
//! |---------------------------------|--------------------------------------|
//! | 200, 201, 202, 204, 207, 303    | success ([`ApiResult`])              |
//! | 301, 302, 307                   | redirect ([`ApiResult::location`])   |
//! | 401, 403, 405                   | [`Error::Security`]                  |
//! | anything else                   | [`Error::Api`]                       |
//!
//! Error bodies are decoded by structural fingerprint, see [`error_body`].
//!
//! # Example
//!
//! ```no_run
//! use carlink_client::{ApiHttpClient, Headers, HttpBody, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = ApiHttpClient::builder().user_agent("okhttp/3.11.0").build()?;
//! let res = client
//!     .post("https://example.com/token", &Headers::new(), HttpBody::form([("grant_type", "refresh_token")]))
//!     .await?;
//! println!("{}", res.body);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod error_body;
pub mod template;

pub use client::{ApiHttpClient, ApiResult, ClientBuilder, Headers, HttpBody};
pub use error::{Error, Result};
pub use error_body::{ApiErrorDetail, ErrorFormat};
pub use template::{UrlParams, expand, resolve_url};

/// JSON content type.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// Form content type.
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
/// XML content type.
pub const CONTENT_TYPE_XML: &str = "application/xml";
