//! Remote vehicle actions.
//!
//! [`VehicleApi`] sends actions (lock, climatisation, charging, window
//! heating, honk and flash, status refresh) and hands accepted requests to a
//! [`PendingActionQueue`], which polls them until they reach a final status
//! and reports progress to an [`ActionListener`].

pub mod actions;
pub mod api;
pub mod dto;
pub mod error;
pub mod fallback;
pub mod listener;
pub mod queue;
pub mod request;
pub mod status;

pub use actions::{ActionRequest, HEATER_SOURCE_ELECTRIC};
pub use api::{ApiCaller, VehicleApi};
pub use dto::{ActionResponse, RequestStatus, parse_action_response, parse_request_status};
pub use error::{ApiError, Result};
pub use fallback::{DirectoryFallback, OfflineFallback};
pub use listener::{ActionEvent, ActionListener, NullListener, RecordingListener, TracingListener};
pub use queue::{PendingActionQueue, StatusChecker};
pub use request::{ActionTimeouts, PendingActionRequest, SERVICE_STATUS_REPORT};
pub use status::ActionStatus;
