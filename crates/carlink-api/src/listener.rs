//! Action event listener.

use parking_lot::Mutex;

/// Receiver of action lifecycle events.
///
/// Calls are fire-and-forget; every method defaults to doing nothing.
pub trait ActionListener: Send + Sync {
    /// Action accepted by the back end and queued for polling.
    fn on_action_sent(&self, _service: &str, _action: &str, _request_id: &str) {}

    /// Action did not reach a final status in time.
    fn on_action_timeout(&self, _service: &str, _action: &str, _request_id: &str) {}

    /// Final status reached; `status` is normalized, `raw_status` as reported.
    fn on_action_result(
        &self,
        _service: &str,
        _action: &str,
        _request_id: &str,
        _status: &str,
        _raw_status: &str,
    ) {
    }

    /// Action rejected before it was sent.
    fn on_action_notification(&self, _service: &str, _action: &str, _message: &str) {}

    /// Back end reported the remaining call budget.
    fn on_rate_limit(&self, _remaining: u32) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default)]
pub struct NullListener;

impl ActionListener for NullListener {}

/// Listener that logs every event.
#[derive(Debug, Default)]
pub struct TracingListener;

impl ActionListener for TracingListener {
    fn on_action_sent(&self, service: &str, action: &str, request_id: &str) {
        tracing::info!(service, action, request_id, "action sent");
    }

    fn on_action_timeout(&self, service: &str, action: &str, request_id: &str) {
        tracing::warn!(service, action, request_id, "action timed out");
    }

    fn on_action_result(
        &self,
        service: &str,
        action: &str,
        request_id: &str,
        status: &str,
        raw_status: &str,
    ) {
        tracing::info!(service, action, request_id, status, raw_status, "action finished");
    }

    fn on_action_notification(&self, service: &str, action: &str, message: &str) {
        tracing::warn!(service, action, "{}", message);
    }

    fn on_rate_limit(&self, remaining: u32) {
        tracing::debug!(remaining, "API calls remaining");
    }
}

/// Event captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    Sent { service: String, action: String, request_id: String },
    Timeout { service: String, action: String, request_id: String },
    Result { request_id: String, status: String, raw_status: String },
    Notification { service: String, action: String, message: String },
    RateLimit(u32),
}

/// In-memory listener for testing.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ActionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActionEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: ActionEvent) {
        self.events.lock().push(event);
    }
}

impl ActionListener for RecordingListener {
    fn on_action_sent(&self, service: &str, action: &str, request_id: &str) {
        self.push(ActionEvent::Sent {
            service: service.to_string(),
            action: action.to_string(),
            request_id: request_id.to_string(),
        });
    }

    fn on_action_timeout(&self, service: &str, action: &str, request_id: &str) {
        self.push(ActionEvent::Timeout {
            service: service.to_string(),
            action: action.to_string(),
            request_id: request_id.to_string(),
        });
    }

    fn on_action_result(
        &self,
        _service: &str,
        _action: &str,
        request_id: &str,
        status: &str,
        raw_status: &str,
    ) {
        self.push(ActionEvent::Result {
            request_id: request_id.to_string(),
            status: status.to_string(),
            raw_status: raw_status.to_string(),
        });
    }

    fn on_action_notification(&self, service: &str, action: &str, message: &str) {
        self.push(ActionEvent::Notification {
            service: service.to_string(),
            action: action.to_string(),
            message: message.to_string(),
        });
    }

    fn on_rate_limit(&self, remaining: u32) {
        self.push(ActionEvent::RateLimit(remaining));
    }
}
