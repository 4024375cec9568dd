//! URL template expansion.
//!
//! Brand endpoints are configured as templates with positional placeholders
//! `{0}` brand, `{1}` country, `{2}` VIN and `{3}` user id. Named
//! placeholders such as `{requestId}` are filled from an extra list.
//! Relative templates are resolved against the brand's API base URL.

use url::Url;

use crate::error::Result;

/// Values for the positional placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    pub brand: String,
    pub country: String,
    pub vin: String,
    pub user_id: String,
}

impl UrlParams {
    pub fn new(brand: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            country: country.into(),
            ..Default::default()
        }
    }

    pub fn with_vin(mut self, vin: impl Into<String>) -> Self {
        self.vin = vin.into();
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Expand `template` and resolve it against `base`.
    pub fn url(&self, base: &str, template: &str, extra: &[(&str, &str)]) -> Result<String> {
        resolve_url(base, &expand(template, self, extra))
    }
}

/// Replace positional and named placeholders in a template.
pub fn expand(template: &str, params: &UrlParams, extra: &[(&str, &str)]) -> String {
    let mut out = template
        .replace("{0}", &params.brand)
        .replace("{1}", &params.country)
        .replace("{2}", &params.vin)
        .replace("{3}", &params.user_id);
    for (name, value) in extra {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Resolve a possibly relative URL against a base URL.
pub fn resolve_url(base: &str, url: &str) -> Result<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url.to_string());
    }
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(url.trim_start_matches('/'))?.to_string())
}
