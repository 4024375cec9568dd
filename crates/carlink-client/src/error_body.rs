//! Decoding of brand error bodies.
//!
//! The brand back ends report errors in several JSON layouts. They are told
//! apart by structural fingerprint rather than by brand:
//!
//! - `"httpStatus"` present: `{"error":{"message":..,"errorCode":..,"httpStatus":..}}`
//! - `"group"` present: `{"error":{"message":..,"errorCode":..,"group":..,"info":..,"retry":..}}`
//! - `"error_code"` present or `error` is a string: flat OAuth style
//!   `{"error":..,"error_code":..,"error_description":..}`
//! - otherwise the gateway style
//!   `{"error":{"errorCode":..,"description":..,"details":{"reason":..}}}`

use serde_json::Value;

/// Which error layout a body matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFormat {
    /// Flat OAuth error (`error`, `error_code`, `error_description`).
    OAuth,
    /// Gateway error with `errorCode` and optional `details`.
    Gateway,
    /// Error object carrying `httpStatus`.
    HttpStatus,
    /// Error object carrying `group` and `retry`.
    Group,
}

/// Normalized error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
    pub format: ErrorFormat,
    pub code: String,
    pub description: String,
    pub reason: String,
    pub http_status: Option<u16>,
    pub retry: Option<bool>,
}

impl ApiErrorDetail {
    /// Decode a body with a top-level `error` member.
    ///
    /// Returns `None` for bodies without one, including bodies where `error`
    /// only appears nested (e.g. `requestStatusResponse.error`).
    pub fn parse(body: &str) -> Option<Self> {
        if !body.contains("\"error\"") {
            return None;
        }
        let root: Value = serde_json::from_str(body).ok()?;
        let error = root.get("error")?;
        if error.is_null() {
            return None;
        }

        let detail = if body.contains("\"httpStatus\"") {
            Self {
                format: ErrorFormat::HttpStatus,
                code: text(error, &["errorCode", "code"]),
                description: text(error, &["message", "description"]),
                reason: text(error, &["info", "reason"]),
                http_status: error
                    .get("httpStatus")
                    .and_then(Value::as_u64)
                    .and_then(|s| u16::try_from(s).ok()),
                retry: None,
            }
        } else if body.contains("\"group\"") {
            Self {
                format: ErrorFormat::Group,
                code: text(error, &["errorCode", "code"]),
                description: text(error, &["message", "description"]),
                reason: text(error, &["info"]),
                http_status: None,
                retry: error.get("retry").and_then(Value::as_bool),
            }
        } else if body.contains("\"error_code\"") || error.is_string() {
            let code = text(&root, &["error_code"]);
            Self {
                format: ErrorFormat::OAuth,
                code: if code.is_empty() {
                    text(&root, &["error"])
                } else {
                    code
                },
                description: text(&root, &["error_description", "error"]),
                reason: String::new(),
                http_status: None,
                retry: None,
            }
        } else {
            Self {
                format: ErrorFormat::Gateway,
                code: text(error, &["errorCode", "code"]),
                description: text(error, &["description", "message"]),
                reason: error
                    .get("details")
                    .map(|d| text(d, &["reason"]))
                    .unwrap_or_default(),
                http_status: None,
                retry: None,
            }
        };
        Some(detail)
    }

    /// One-line message for logs and error values.
    pub fn message(&self) -> String {
        let mut msg = match (self.code.is_empty(), self.description.is_empty()) {
            (false, false) => format!("{}: {}", self.code, self.description),
            (false, true) => self.code.clone(),
            (true, false) => self.description.clone(),
            (true, true) => "unspecified error".to_string(),
        };
        if !self.reason.is_empty() {
            msg.push_str(&format!(" ({})", self.reason));
        }
        msg
    }
}

/// First present member of `keys` as text; numbers are stringified.
fn text(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| match value.get(*k) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_flat_error() {
        let d = ApiErrorDetail::parse(
            r#"{"error":"invalid_grant","error_code":"401","error_description":"Token expired"}"#,
        )
        .unwrap();
        assert_eq!(d.format, ErrorFormat::OAuth);
        assert_eq!(d.code, "401");
        assert_eq!(d.description, "Token expired");
    }

    #[test]
    fn test_oauth_error_without_code() {
        let d = ApiErrorDetail::parse(r#"{"error":"invalid_request"}"#).unwrap();
        assert_eq!(d.format, ErrorFormat::OAuth);
        assert_eq!(d.code, "invalid_request");
        assert_eq!(d.message(), "invalid_request: invalid_request");
    }

    #[test]
    fn test_gateway_error_with_details() {
        let d = ApiErrorDetail::parse(
            r#"{"error":{"errorCode":"gw.error.authorization","description":"SPIN invalid","details":{"challenge":"","user":"u","reason":"SECURITY_PIN_INVALID","delay":"0"}}}"#,
        )
        .unwrap();
        assert_eq!(d.format, ErrorFormat::Gateway);
        assert_eq!(d.code, "gw.error.authorization");
        assert_eq!(d.reason, "SECURITY_PIN_INVALID");
        assert_eq!(
            d.message(),
            "gw.error.authorization: SPIN invalid (SECURITY_PIN_INVALID)"
        );
    }

    #[test]
    fn test_http_status_error() {
        let d = ApiErrorDetail::parse(
            r#"{"error":{"message":"Vehicle not found","errorCode":"4711","httpStatus":404}}"#,
        )
        .unwrap();
        assert_eq!(d.format, ErrorFormat::HttpStatus);
        assert_eq!(d.http_status, Some(404));
        assert_eq!(d.code, "4711");
    }

    #[test]
    fn test_group_error() {
        let d = ApiErrorDetail::parse(
            r#"{"error":{"message":"Unauthorized","errorCode":2002,"group":2,"info":"token","retry":false}}"#,
        )
        .unwrap();
        assert_eq!(d.format, ErrorFormat::Group);
        assert_eq!(d.code, "2002");
        assert_eq!(d.retry, Some(false));
        assert_eq!(d.reason, "token");
    }

    #[test]
    fn test_nested_error_is_not_an_error_body() {
        assert!(
            ApiErrorDetail::parse(
                r#"{"requestStatusResponse":{"status":"request_fail","error":200}}"#
            )
            .is_none()
        );
        assert!(ApiErrorDetail::parse(r#"{"error":null}"#).is_none());
        assert!(ApiErrorDetail::parse("<html>error</html>").is_none());
    }
}
