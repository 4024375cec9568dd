//! Pending action requests and their timeouts.

use std::collections::HashMap;
use std::time::Duration;

use carlink_config::ActionConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Service whose requests take twice the configured timeout.
pub const SERVICE_STATUS_REPORT: &str = "statusreport_v1";

/// An accepted action awaiting its final status.
#[derive(Debug, Clone, Serialize)]
pub struct PendingActionRequest {
    pub vin: String,
    pub service: String,
    pub action: String,
    pub request_id: String,
    /// Status endpoint; empty when the service has none.
    pub check_url: String,
    /// Last raw status reported by the back end.
    pub status: String,
    pub error: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub timeout: Duration,
}

impl PendingActionRequest {
    pub fn new(
        vin: impl Into<String>,
        service: impl Into<String>,
        action: impl Into<String>,
        request_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            vin: vin.into(),
            service: service.into(),
            action: action.into(),
            request_id: request_id.into(),
            check_url: String::new(),
            status: String::new(),
            error: None,
            created_at: Utc::now(),
            timeout,
        }
    }

    pub fn with_check_url(mut self, url: impl Into<String>) -> Self {
        self.check_url = url.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).to_std().unwrap_or_default();
        age > self.timeout
    }
}

/// Per-service request timeouts.
#[derive(Debug, Clone)]
pub struct ActionTimeouts {
    default: Duration,
    overrides: HashMap<String, Duration>,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self::from_config(&ActionConfig::default())
    }
}

impl ActionTimeouts {
    pub fn from_config(config: &ActionConfig) -> Self {
        Self {
            default: Duration::from_secs(config.default_timeout_secs),
            overrides: config
                .timeouts
                .iter()
                .map(|(k, v)| (k.clone(), Duration::from_secs(*v)))
                .collect(),
        }
    }

    /// Timeout for requests of `service`.
    pub fn for_service(&self, service: &str) -> Duration {
        if let Some(t) = self.overrides.get(service) {
            return *t;
        }
        if service == SERVICE_STATUS_REPORT {
            return self.default * 2;
        }
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_expiry() {
        let mut r = PendingActionRequest::new("VIN", "rlu_v1", "LOCK", "1", Duration::from_secs(60));
        assert!(!r.is_expired());
        r.created_at = Utc::now() - ChronoDuration::seconds(61);
        assert!(r.is_expired());
    }

    #[test]
    fn test_timeouts() {
        let mut config = ActionConfig::default();
        config.timeouts.insert("rclima_v1".to_string(), 120);
        let t = ActionTimeouts::from_config(&config);

        assert_eq!(t.for_service("rlu_v1"), Duration::from_secs(60));
        assert_eq!(t.for_service("rclima_v1"), Duration::from_secs(120));
        assert_eq!(t.for_service(SERVICE_STATUS_REPORT), Duration::from_secs(120));
    }
}
