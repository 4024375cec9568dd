//! String matching over login pages and redirect locations.
//!
//! Identity provider pages are HTML with hidden form fields or, in newer
//! variants, a JavaScript blob (`window._IDK = { templateModel: {...} }`).
//! Every piece of markup knowledge used by the login flow lives here so it
//! can be tested against captured page fixtures.

use url::form_urlencoded;

/// Outcome of inspecting a redirect location during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStep {
    /// The redirect URI was reached; the location carries the grant.
    Completed,
    /// Another hop inside the identity provider.
    Continue,
    /// The account never gave consent for this app.
    ConsentMissing,
    /// Updated terms and conditions must be accepted.
    TermsAndConditions,
    /// Updated data privacy statement must be accepted.
    DataPrivacy,
    /// Username or password rejected.
    InvalidCredentials,
    /// Account locked after too many attempts.
    AccountLocked,
    /// Login temporarily throttled.
    Throttled,
    /// Identity provider reported another error.
    Failed(String),
}

impl LoginStep {
    /// Remediation text for steps that end the login.
    pub fn error_message(&self) -> Option<String> {
        let msg = match self {
            LoginStep::Completed | LoginStep::Continue => return None,
            LoginStep::ConsentMissing => {
                "Consent missing, login to the Web App and give consent".to_string()
            }
            LoginStep::TermsAndConditions => {
                "New terms and conditions, login to the Web App and accept them".to_string()
            }
            LoginStep::DataPrivacy => {
                "New data privacy statement, login to the Web App and accept it".to_string()
            }
            LoginStep::InvalidCredentials => {
                "Login failed, check username and password".to_string()
            }
            LoginStep::AccountLocked => {
                "Account is locked, unlock it in the Web App".to_string()
            }
            LoginStep::Throttled => {
                "Too many login attempts, try again later".to_string()
            }
            LoginStep::Failed(reason) => format!("Login failed: {}", reason),
        };
        Some(msg)
    }
}

/// Text between `start` and the next `end`.
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

/// Value of a hidden `<input>` field.
///
/// Matches `name="X" value="..."` first, then any `<input>` tag carrying
/// `name="X"` with the value attribute in another position.
pub fn input_value(html: &str, name: &str) -> Option<String> {
    let direct = format!("name=\"{}\" value=\"", name);
    if let Some(v) = extract_between(html, &direct, "\"") {
        return Some(v.to_string());
    }

    let needle = format!("name=\"{}\"", name);
    let mut rest = html;
    while let Some(pos) = rest.find("<input") {
        let tag_start = &rest[pos..];
        let tag_end = tag_start.find('>').unwrap_or(tag_start.len());
        let tag = &tag_start[..tag_end];
        if tag.contains(&needle)
            && let Some(v) = extract_between(tag, "value=\"", "\"")
        {
            return Some(v.to_string());
        }
        rest = &tag_start[tag_end..];
    }
    None
}

/// String value of `"key":"..."` (whitespace tolerant) or `key: '...'`.
pub fn json_string_value(html: &str, key: &str) -> Option<String> {
    let quoted = format!("\"{}\"", key);
    let mut rest = html;
    while let Some(pos) = rest.find(&quoted) {
        let after = rest[pos + quoted.len()..].trim_start();
        if let Some(after) = after.strip_prefix(':') {
            let after = after.trim_start();
            if let Some(v) = after.strip_prefix('"') {
                return v.find('"').map(|end| v[..end].to_string());
            }
        }
        rest = &rest[pos + quoted.len()..];
    }

    let bare = format!("{}:", key);
    let pos = html.find(&bare)?;
    let after = html[pos + bare.len()..].trim_start();
    let quote = after.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let v = &after[1..];
    v.find(quote).map(|end| v[..end].to_string())
}

/// `action` attribute of the form with the given id, or of the first form.
pub fn form_action(html: &str, form_id: &str) -> Option<String> {
    let start = if form_id.is_empty() {
        html.find("<form")?
    } else {
        let id = format!("id=\"{}\"", form_id);
        let id_pos = html.find(&id)?;
        html[..id_pos].rfind("<form")?
    };
    let tag = &html[start..];
    let tag = &tag[..tag.find('>').unwrap_or(tag.len())];
    extract_between(tag, "action=\"", "\"").map(|a| a.replace("&amp;", "&"))
}

/// Query and fragment parameters of a URL, percent-decoded.
pub fn query_params(url: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let (before_fragment, fragment) = match url.split_once('#') {
        Some((b, f)) => (b, Some(f)),
        None => (url, None),
    };
    if let Some((_, query)) = before_fragment.split_once('?') {
        params.extend(form_urlencoded::parse(query.as_bytes()).into_owned());
    }
    if let Some(fragment) = fragment {
        params.extend(form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }
    params
}

/// Single query or fragment parameter.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    query_params(url)
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
}

/// Decide what a redirect location means for the login.
pub fn classify_location(location: &str, redirect_uri: &str) -> LoginStep {
    if location.is_empty() {
        return LoginStep::Failed("no redirect location".to_string());
    }
    if !redirect_uri.is_empty() && location.starts_with(redirect_uri) {
        return LoginStep::Completed;
    }

    let lower = location.to_ascii_lowercase();
    if lower.contains("/consent") || lower.contains("consent_required") {
        return LoginStep::ConsentMissing;
    }
    if lower.contains("terms-and-conditions") || lower.contains("termsandconditions") {
        return LoginStep::TermsAndConditions;
    }
    if lower.contains("dataprivacy") || lower.contains("data-privacy") {
        return LoginStep::DataPrivacy;
    }
    if lower.contains("password_invalid") || lower.contains("login.errors.credentials") {
        return LoginStep::InvalidCredentials;
    }
    if lower.contains("account_locked") {
        return LoginStep::AccountLocked;
    }
    if lower.contains("throttled") {
        return LoginStep::Throttled;
    }
    if let Some(error) = query_param(location, "error") {
        let description = query_param(location, "error_description").unwrap_or_default();
        return LoginStep::Failed(if description.is_empty() {
            error
        } else {
            format!("{} ({})", error, description)
        });
    }
    LoginStep::Continue
}
