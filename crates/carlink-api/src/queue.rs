//! Pending action queue.
//!
//! Accepted actions are tracked by request id until the back end reports a
//! final status or the per-service timeout elapses. The queue owns no timer;
//! callers drive [`PendingActionQueue::check_pending_requests`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::dto::RequestStatus;
use crate::error::{ApiError, Result};
use crate::listener::ActionListener;
use crate::request::PendingActionRequest;
use crate::status::ActionStatus;

/// Queries the status endpoint of a pending request.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    async fn check_status(&self, request: &PendingActionRequest) -> Result<RequestStatus>;
}

/// Requests awaiting a final status, keyed by request id.
pub struct PendingActionQueue {
    pending: DashMap<String, PendingActionRequest>,
    listener: Arc<dyn ActionListener>,
    checker: Arc<dyn StatusChecker>,
}

impl PendingActionQueue {
    pub fn new(listener: Arc<dyn ActionListener>, checker: Arc<dyn StatusChecker>) -> Self {
        Self {
            pending: DashMap::new(),
            listener,
            checker,
        }
    }

    /// Track `request` and check its status once.
    ///
    /// A request with the same id replaces the earlier one.
    pub async fn queue_pending_action(&self, request: PendingActionRequest) -> Result<ActionStatus> {
        if request.request_id.is_empty() {
            return Err(ApiError::Api(format!(
                "No request id for {}.{}",
                request.service, request.action
            )));
        }
        let id = request.request_id.clone();
        let raw = request.status.clone();
        tracing::info!(
            vin = %request.vin,
            service = %request.service,
            action = %request.action,
            request_id = %id,
            "queued pending action"
        );
        self.listener
            .on_action_sent(&request.service, &request.action, &id);
        self.pending.insert(id.clone(), request);
        self.get_request_status(&id, &raw).await
    }

    /// Poll every pending request once.
    pub async fn check_pending_requests(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.get_request_status(&id, "").await {
                tracing::warn!(request_id = %id, error = %e, "status check failed");
            }
        }
    }

    /// Advance the request `id` using `raw_status`, or ask the back end when empty.
    pub async fn get_request_status(&self, id: &str, raw_status: &str) -> Result<ActionStatus> {
        let request = self
            .pending
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| ApiError::Api(format!("Unknown request id: {}", id)))?;

        if request.is_expired() {
            if self.pending.remove(id).is_some() {
                tracing::warn!(service = %request.service, action = %request.action, request_id = id, "request timed out");
                self.listener
                    .on_action_timeout(&request.service, &request.action, id);
            }
            return Ok(ActionStatus::Timeout);
        }

        let mut raw = raw_status.to_string();
        if raw.is_empty() {
            if request.check_url.is_empty() {
                tracing::warn!(service = %request.service, request_id = id, "no status endpoint");
                return Ok(self.finish(&request, ActionStatus::Error, ""));
            }
            match self.checker.check_status(&request).await {
                Ok(status) => {
                    if let Some(mut entry) = self.pending.get_mut(id) {
                        entry.error = status.error;
                    }
                    raw = status.status;
                }
                Err(e) => {
                    tracing::warn!(service = %request.service, request_id = id, error = %e, "status request failed");
                    return Ok(self.finish(&request, ActionStatus::Error, ""));
                }
            }
        }

        let status = ActionStatus::normalize(&raw);
        if status.is_terminal() {
            return Ok(self.finish(&request, status, &raw));
        }
        if let Some(mut entry) = self.pending.get_mut(id) {
            entry.status = raw.clone();
        }
        if let ActionStatus::Unknown(_) = status {
            tracing::info!(service = %request.service, request_id = id, raw_status = %raw, "unknown request status");
        } else {
            tracing::debug!(service = %request.service, request_id = id, status = %status, "request in progress");
        }
        Ok(status)
    }

    fn finish(&self, request: &PendingActionRequest, status: ActionStatus, raw: &str) -> ActionStatus {
        if self.pending.remove(&request.request_id).is_some() {
            tracing::info!(
                service = %request.service,
                action = %request.action,
                request_id = %request.request_id,
                status = %status,
                "request finished"
            );
            self.listener.on_action_result(
                &request.service,
                &request.action,
                &request.request_id,
                &status.to_string(),
                raw,
            );
        }
        status
    }

    /// Any request pending for `service`.
    pub fn is_request_pending(&self, service: &str) -> bool {
        self.pending.iter().any(|e| e.value().service == service)
    }

    pub fn are_requests_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<PendingActionRequest> {
        self.pending.get(id).map(|e| e.value().clone())
    }

    /// Snapshot of all pending requests.
    pub fn pending(&self) -> Vec<PendingActionRequest> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ActionEvent, RecordingListener};
    use chrono::{Duration as ChronoDuration, Utc};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Returns queued statuses in order, then errors.
    #[derive(Default)]
    struct ScriptedChecker {
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedChecker {
        fn new(replies: &[&str]) -> Self {
            let mut r: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
            r.reverse();
            Self {
                replies: Mutex::new(r),
            }
        }
    }

    #[async_trait]
    impl StatusChecker for ScriptedChecker {
        async fn check_status(&self, _request: &PendingActionRequest) -> Result<RequestStatus> {
            match self.replies.lock().pop() {
                Some(status) => Ok(RequestStatus { status, error: None }),
                None => Err(ApiError::Api("no reply".to_string())),
            }
        }
    }

    fn setup(replies: &[&str]) -> (PendingActionQueue, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::new());
        let queue = PendingActionQueue::new(listener.clone(), Arc::new(ScriptedChecker::new(replies)));
        (queue, listener)
    }

    fn request(id: &str) -> PendingActionRequest {
        PendingActionRequest::new("VIN", "rlu_v1", "LOCK", id, Duration::from_secs(60))
            .with_check_url("https://example.com/status")
    }

    #[tokio::test]
    async fn test_queue_and_complete() {
        let (queue, listener) = setup(&["request_in_progress", "request_successful"]);

        let status = queue.queue_pending_action(request("1")).await.unwrap();
        assert_eq!(status, ActionStatus::InProgress);
        assert!(queue.is_request_pending("rlu_v1"));
        assert_eq!(queue.get("1").unwrap().status, "request_in_progress");

        queue.check_pending_requests().await;
        assert!(queue.is_empty());
        assert_eq!(
            listener.events().last(),
            Some(&ActionEvent::Result {
                request_id: "1".to_string(),
                status: "SUCCESSFUL".to_string(),
                raw_status: "request_successful".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_initial_status_skips_checker() {
        let (queue, _) = setup(&[]);
        let status = queue
            .queue_pending_action(request("1").with_status("queued"))
            .await
            .unwrap();
        assert_eq!(status, ActionStatus::InProgress);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_same_id_replaces() {
        let (queue, _) = setup(&[]);
        queue.queue_pending_action(request("1").with_status("queued")).await.unwrap();
        queue.queue_pending_action(request("1").with_status("started")).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get("1").unwrap().status, "started");
    }

    #[tokio::test]
    async fn test_timeout_fires_once() {
        let (queue, listener) = setup(&[]);
        let mut r = request("1").with_status("queued");
        r.created_at = Utc::now() - ChronoDuration::seconds(120);
        queue.pending.insert("1".to_string(), r);

        assert_eq!(queue.get_request_status("1", "").await.unwrap(), ActionStatus::Timeout);
        assert!(queue.get_request_status("1", "").await.is_err());

        let timeouts = listener
            .events()
            .into_iter()
            .filter(|e| matches!(e, ActionEvent::Timeout { .. }))
            .count();
        assert_eq!(timeouts, 1);
    }

    #[tokio::test]
    async fn test_missing_check_url_is_error() {
        let (queue, listener) = setup(&[]);
        let r = PendingActionRequest::new("VIN", "rhonk_v1", "FLASH_ONLY", "7", Duration::from_secs(60));
        let status = queue.queue_pending_action(r).await.unwrap();
        assert_eq!(status, ActionStatus::Error);
        assert!(queue.is_empty());
        assert!(matches!(
            listener.events().last(),
            Some(ActionEvent::Result { status, .. }) if status == "ERROR"
        ));
    }

    #[tokio::test]
    async fn test_checker_failure_is_error() {
        let (queue, _) = setup(&[]);
        let status = queue.queue_pending_action(request("1")).await.unwrap();
        assert_eq!(status, ActionStatus::Error);
        assert!(!queue.are_requests_pending());
    }

    #[tokio::test]
    async fn test_unknown_status_kept() {
        let (queue, listener) = setup(&["Pondering"]);
        let status = queue.queue_pending_action(request("1")).await.unwrap();
        assert_eq!(status, ActionStatus::Unknown("pondering".to_string()));
        assert_eq!(queue.len(), 1);
        assert!(
            !listener
                .events()
                .iter()
                .any(|e| matches!(e, ActionEvent::Result { .. }))
        );
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let (queue, _) = setup(&["request_fail"]);
        let status = queue.queue_pending_action(request("1")).await.unwrap();
        assert_eq!(status, ActionStatus::Failed);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let (queue, listener) = setup(&[]);
        assert!(queue.queue_pending_action(request("")).await.is_err());
        assert!(listener.events().is_empty());
        assert!(queue.get_request_status("nope", "").await.is_err());
    }
}
