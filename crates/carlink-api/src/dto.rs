//! Response shapes of action and request status endpoints.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Status reported by a request status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStatus {
    pub status: String,
    pub error: Option<i64>,
}

/// Request id and initial status from an action response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionResponse {
    pub request_id: String,
    pub status: String,
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequestIdDto {
    #[serde(rename = "requestId")]
    request_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ActionDto {
    action_id: Option<Value>,
    action_state: Option<String>,
    error_code: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatusCodeDto {
    status_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HonkFlashDto {
    id: Option<Value>,
    status: Option<StatusCodeDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActionResponseDto {
    #[serde(rename = "rluActionResponse")]
    rlu: Option<RequestIdDto>,
    action: Option<ActionDto>,
    #[serde(rename = "performActionResponse")]
    perform_action: Option<RequestIdDto>,
    #[serde(rename = "CurrentVehicleDataResponse")]
    current_vehicle_data: Option<RequestIdDto>,
    #[serde(rename = "honkAndFlashRequest")]
    honk_and_flash: Option<HonkFlashDto>,
    #[serde(rename = "requestId")]
    request_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequestStatusResponseDto {
    status: Option<String>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RequestStatusDto {
    #[serde(rename = "requestStatusResponse")]
    request_status: Option<RequestStatusResponseDto>,
    action: Option<ActionDto>,
    status: Option<StatusCodeDto>,
}

/// String or number as text.
fn scalar(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(value: &Option<Value>) -> Option<i64> {
    match value.as_ref()? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Extract the request id from an accepted action.
pub fn parse_action_response(body: &str) -> Result<ActionResponse> {
    let dto: ActionResponseDto = serde_json::from_str(body)?;

    let from_id = |id: Option<&RequestIdDto>| id.and_then(|d| scalar(&d.request_id));

    let parsed = if let Some(id) = from_id(dto.rlu.as_ref()) {
        ActionResponse {
            request_id: id,
            status: String::new(),
        }
    } else if let Some(action) = dto.action.as_ref()
        && let Some(id) = scalar(&action.action_id)
    {
        ActionResponse {
            request_id: id,
            status: action.action_state.clone().unwrap_or_default(),
        }
    } else if let Some(id) = from_id(dto.perform_action.as_ref())
        .or_else(|| from_id(dto.current_vehicle_data.as_ref()))
    {
        ActionResponse {
            request_id: id,
            status: String::new(),
        }
    } else if let Some(hf) = dto.honk_and_flash.as_ref()
        && let Some(id) = scalar(&hf.id)
    {
        ActionResponse {
            request_id: id,
            status: hf
                .status
                .as_ref()
                .and_then(|s| s.status_code.clone())
                .unwrap_or_default(),
        }
    } else {
        ActionResponse {
            request_id: scalar(&dto.request_id).unwrap_or_default(),
            status: String::new(),
        }
    };
    Ok(parsed)
}

/// Decode a request status body.
pub fn parse_request_status(body: &str) -> Result<RequestStatus> {
    let dto: RequestStatusDto = serde_json::from_str(body)?;
    if let Some(r) = dto.request_status {
        return Ok(RequestStatus {
            status: r.status.unwrap_or_default(),
            error: integer(&r.error),
        });
    }
    if let Some(a) = dto.action {
        return Ok(RequestStatus {
            status: a.action_state.unwrap_or_default(),
            error: integer(&a.error_code),
        });
    }
    if let Some(s) = dto.status {
        return Ok(RequestStatus {
            status: s.status_code.unwrap_or_default(),
            error: None,
        });
    }
    Err(ApiError::Api(format!(
        "Unrecognized request status response: {}",
        body
    )))
}
