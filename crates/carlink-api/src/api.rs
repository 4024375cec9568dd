//! Vehicle action sender.

use std::sync::Arc;

use async_trait::async_trait;
use carlink_client::{ApiResult, Headers, HttpBody};
use carlink_config::ActionConfig;
use carlink_oauth::{ApiContext, IdentityManager};
use url::Url;

use crate::actions::{self, ACTION_CLIMA_START_AUX, ACTION_STATUS, ActionRequest, SERVICE_STATUS_REPORT};
use crate::dto::{RequestStatus, parse_action_response, parse_request_status};
use crate::error::{ApiError, Result};
use crate::fallback::OfflineFallback;
use crate::listener::ActionListener;
use crate::queue::{PendingActionQueue, StatusChecker};
use crate::request::{ActionTimeouts, PendingActionRequest};
use crate::status::ActionStatus;

const ACTION_ACCEPT: &str = "application/json, application/vnd.vwg.mbb.ChargerAction_v1_0_0+xml,application/vnd.volkswagenag.com-error-v1+xml,application/vnd.vwg.mbb.genericError_v1_0_2+xml,application/vnd.vwg.mbb.RemoteStandheizung_v2_0_0+xml,application/vnd.vwg.mbb.genericError_v1_0_2+xml,application/vnd.vwg.mbb.RemoteLockUnlock_v1_0_0+xml,application/vnd.vwg.mbb.operationList_v3_0_2+xml,application/vnd.vwg.mbb.genericError_v1_0_2+xml,*/*";

const SECURITY_HEADER: &str = "x-mbbSecToken";
const SECURITY_HEADER_AUX_HEATING: &str = "X-securityToken";

// ============================================================================
// ApiCaller
// ============================================================================

/// Authenticated HTTP calls on behalf of one vehicle.
#[derive(Clone)]
pub struct ApiCaller {
    identity: Arc<IdentityManager>,
    ctx: ApiContext,
    listener: Arc<dyn ActionListener>,
}

impl ApiCaller {
    pub fn new(identity: Arc<IdentityManager>, ctx: ApiContext, listener: Arc<dyn ActionListener>) -> Self {
        Self {
            identity,
            ctx,
            listener,
        }
    }

    pub fn context(&self) -> &ApiContext {
        &self.ctx
    }

    /// Expand an endpoint template and resolve it against the API base URL.
    pub fn url(&self, template: &str, extra: &[(&str, &str)]) -> Result<String> {
        Ok(self
            .ctx
            .url_params()
            .url(&self.ctx.profile.api_base_url, template, extra)?)
    }

    /// Headers identifying the app, with a bearer token.
    pub async fn app_headers(&self) -> Result<Headers> {
        let token = self.identity.create_access_token(&self.ctx).await?;
        let profile = &self.ctx.profile;
        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), profile.user_agent.clone());
        headers.insert("X-App-Name".to_string(), profile.app_name.clone());
        headers.insert("X-App-Version".to_string(), profile.app_version.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        Ok(headers)
    }

    /// Headers for an action POST.
    pub async fn action_headers(
        &self,
        action: &str,
        content_type: &str,
        security_token: Option<&str>,
    ) -> Result<Headers> {
        let mut headers = self.app_headers().await?;
        headers.insert("Accept".to_string(), ACTION_ACCEPT.to_string());
        headers.insert("Accept-Charset".to_string(), "UTF-8".to_string());
        headers.insert("Content-Type".to_string(), content_type.to_string());
        headers.insert("Host".to_string(), self.ctx.profile.api_host().to_string());
        if let Some(token) = security_token.filter(|t| !t.is_empty()) {
            let name = if action == ACTION_CLIMA_START_AUX {
                SECURITY_HEADER_AUX_HEATING
            } else {
                SECURITY_HEADER
            };
            headers.insert(name.to_string(), token.to_string());
        }
        Ok(headers)
    }

    pub async fn get(&self, url: &str, headers: &Headers) -> Result<ApiResult> {
        let http = self.identity.token_set(&self.ctx.group_id)?.http;
        let result = http.get(url, headers).await?;
        self.note_rate_limit(&result);
        Ok(result)
    }

    pub async fn post(&self, url: &str, headers: &Headers, body: HttpBody) -> Result<ApiResult> {
        let http = self.identity.token_set(&self.ctx.group_id)?.http;
        let result = http.post(url, headers, body).await?;
        self.note_rate_limit(&result);
        Ok(result)
    }

    fn note_rate_limit(&self, result: &ApiResult) {
        if let Some(remaining) = result.rate_limit() {
            self.listener.on_rate_limit(remaining);
        }
    }
}

#[async_trait]
impl StatusChecker for ApiCaller {
    async fn check_status(&self, request: &PendingActionRequest) -> Result<RequestStatus> {
        let headers = self.app_headers().await?;
        let result = self.get(&request.check_url, &headers).await?;
        tracing::debug!(request_id = %request.request_id, body = %result.body, "request status");
        parse_request_status(&result.body)
    }
}

// ============================================================================
// VehicleApi
// ============================================================================

/// Remote actions and data calls for one vehicle.
pub struct VehicleApi {
    caller: ApiCaller,
    queue: Arc<PendingActionQueue>,
    listener: Arc<dyn ActionListener>,
    timeouts: ActionTimeouts,
    fallback: Option<Arc<dyn OfflineFallback>>,
}

impl VehicleApi {
    pub fn new(
        identity: Arc<IdentityManager>,
        ctx: ApiContext,
        listener: Arc<dyn ActionListener>,
        config: &ActionConfig,
    ) -> Self {
        let caller = ApiCaller::new(identity, ctx, listener.clone());
        let queue = Arc::new(PendingActionQueue::new(
            listener.clone(),
            Arc::new(caller.clone()),
        ));
        Self {
            caller,
            queue,
            listener,
            timeouts: ActionTimeouts::from_config(config),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn OfflineFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn context(&self) -> &ApiContext {
        self.caller.context()
    }

    pub fn queue(&self) -> &Arc<PendingActionQueue> {
        &self.queue
    }

    /// Poll all pending requests once.
    pub async fn check_pending_requests(&self) {
        self.queue.check_pending_requests().await;
    }

    // ────────────────────────────────────────────────────────────────────────
    // Actions
    // ────────────────────────────────────────────────────────────────────────

    /// Send an action and queue it for status polling.
    ///
    /// Never fails: rejections are reported through
    /// [`ActionListener::on_action_notification`] and return
    /// [`ActionStatus::Rejected`].
    pub async fn send_action(
        &self,
        uri: &str,
        service: &str,
        action: &str,
        requires_pin: bool,
        content_type: &str,
        body: &str,
    ) -> ActionStatus {
        if requires_pin && !self.context().credentials.has_pin() {
            return self.reject(
                service,
                action,
                &format!(
                    "Action {}.{} requires the SPIN, but it's not configured!",
                    service, action
                ),
            );
        }
        if self.queue.is_request_pending(service) {
            return self.reject(
                service,
                action,
                &format!(
                    "Request {}.{} is rejected, there is already a request pending for this service!",
                    service, action
                ),
            );
        }

        match self
            .post_action(uri, service, action, requires_pin, content_type, body)
            .await
        {
            Ok(status) => status,
            Err(e) => self.reject(service, action, &e.to_string()),
        }
    }

    async fn post_action(
        &self,
        uri: &str,
        service: &str,
        action: &str,
        requires_pin: bool,
        content_type: &str,
        body: &str,
    ) -> Result<ActionStatus> {
        let ctx = self.context();
        let security_token = if requires_pin {
            Some(
                self.caller
                    .identity
                    .create_security_token(ctx, service, action)
                    .await?,
            )
        } else {
            None
        };

        let url = self.caller.url(uri, &[])?;
        let headers = self
            .caller
            .action_headers(action, content_type, security_token.as_deref())
            .await?;
        tracing::info!(vin = %ctx.vin, service, action, "sending action");
        let result = self
            .caller
            .post(&url, &headers, HttpBody::Raw(body.to_string()))
            .await?;

        let response = parse_action_response(&result.body)?;
        self.queue_request(service, action, &response.request_id, &response.status)
            .await
    }

    async fn queue_request(
        &self,
        service: &str,
        action: &str,
        request_id: &str,
        status: &str,
    ) -> Result<ActionStatus> {
        let request = PendingActionRequest::new(
            &self.context().vin,
            service,
            action,
            request_id,
            self.timeouts.for_service(service),
        )
        .with_check_url(self.status_url(service, request_id)?)
        .with_status(status);
        self.queue.queue_pending_action(request).await
    }

    fn reject(&self, service: &str, action: &str, message: &str) -> ActionStatus {
        tracing::warn!(service, action, "{}", message);
        self.listener.on_action_notification(service, action, message);
        ActionStatus::Rejected
    }

    /// Status endpoint of a request, empty when the service has none.
    fn status_url(&self, service: &str, request_id: &str) -> Result<String> {
        match self.context().profile.status_urls.get(service) {
            Some(template) if !request_id.is_empty() => {
                self.caller.url(template, &[("requestId", request_id)])
            }
            _ => Ok(String::new()),
        }
    }

    fn action_uri(&self, service: &str) -> String {
        self.context()
            .profile
            .action_urls
            .get(service)
            .cloned()
            .unwrap_or_else(|| actions::default_uri(service).to_string())
    }

    async fn send(&self, request: ActionRequest) -> ActionStatus {
        let uri = match request.endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => self.action_uri(request.service),
        };
        self.send_action(
            &uri,
            request.service,
            &request.action,
            request.requires_pin,
            request.content_type,
            &request.body,
        )
        .await
    }

    pub async fn control_lock(&self, lock: bool) -> ActionStatus {
        self.send(actions::lock(lock)).await
    }

    pub async fn control_climater(&self, start: bool, heater_source: &str) -> ActionStatus {
        let format = self.context().profile.climate_body;
        self.send(actions::climater(format, start, heater_source))
            .await
    }

    /// Set the target temperature used by the next climatisation.
    pub async fn control_climater_temp(&self, temp_celsius: f64, heater_source: &str) -> ActionStatus {
        self.send(actions::climater_temp(temp_celsius, heater_source))
            .await
    }

    /// Start or stop the auxiliary heater for `duration_mins`.
    pub async fn control_pre_heating(&self, start: bool, duration_mins: u32) -> ActionStatus {
        let format = self.context().profile.climate_body;
        self.send(actions::pre_heating(format, start, duration_mins))
            .await
    }

    pub async fn control_ventilation(&self, start: bool, duration_mins: u32) -> ActionStatus {
        let format = self.context().profile.climate_body;
        self.send(actions::ventilation(format, start, duration_mins))
            .await
    }

    pub async fn control_charger(&self, start: bool) -> ActionStatus {
        self.send(actions::charger(start)).await
    }

    pub async fn control_max_charge(&self, max_current: u32) -> ActionStatus {
        self.send(actions::max_charge(max_current)).await
    }

    /// The MBB back end has no target state-of-charge setting.
    pub async fn control_target_charge_level(&self, level: u8) -> ActionStatus {
        tracing::debug!(level, "target charge level requested");
        self.reject(
            actions::SERVICE_BATTERY_CHARGE,
            actions::ACTION_SET_TARGET_SOC,
            "Unsupported function",
        )
    }

    pub async fn control_window_heating(&self, start: bool) -> ActionStatus {
        self.send(actions::window_heating(start)).await
    }

    pub async fn control_honk_flash(
        &self,
        honk: bool,
        latitude: f64,
        longitude: f64,
        duration_secs: u32,
    ) -> ActionStatus {
        self.send(actions::honk_flash(honk, latitude, longitude, duration_secs))
            .await
    }

    /// Ask the vehicle to report fresh status data.
    pub async fn refresh_vehicle_status(&self) -> ActionStatus {
        let service = SERVICE_STATUS_REPORT;
        let action = ACTION_STATUS;
        if self.queue.is_request_pending(service) {
            return self.reject(
                service,
                action,
                &format!(
                    "Request {}.{} is rejected, there is already a request pending for this service!",
                    service, action
                ),
            );
        }
        match self.post_status_request().await {
            Ok(status) => status,
            Err(e) => self.reject(service, action, &e.to_string()),
        }
    }

    async fn post_status_request(&self) -> Result<ActionStatus> {
        let url = self.caller.url(&self.action_uri(SERVICE_STATUS_REPORT), &[])?;
        let headers = self.caller.app_headers().await?;
        let result = self.caller.post(&url, &headers, HttpBody::Empty).await?;
        let response = parse_action_response(&result.body)?;
        self.queue_request(
            SERVICE_STATUS_REPORT,
            ACTION_STATUS,
            &response.request_id,
            &response.status,
        )
        .await
    }

    // ────────────────────────────────────────────────────────────────────────
    // Data
    // ────────────────────────────────────────────────────────────────────────

    /// GET a data endpoint.
    ///
    /// A single redirect is followed. When access is refused, the offline
    /// fallback is asked for a stored `function` response.
    pub async fn call_api(&self, uri: &str, function: &str) -> Result<String> {
        match self.fetch(uri).await {
            Ok(body) => Ok(body),
            Err(e) if e.is_security() => {
                if let Some(body) = self.fallback.as_ref().and_then(|f| f.load(function)) {
                    tracing::info!(function, "using offline response");
                    return Ok(body);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, uri: &str) -> Result<String> {
        let url = self.caller.url(uri, &[])?;
        let headers = self.caller.app_headers().await?;
        let result = self.caller.get(&url, &headers).await?;
        if result.is_redirect() {
            let location = result.location_or_empty();
            if location.is_empty() {
                return Err(ApiError::Api(format!("Redirect without location from {}", url)));
            }
            let target = Url::parse(&url)
                .and_then(|base| base.join(location))
                .map_err(|e| ApiError::Api(format!("Invalid redirect {}: {}", location, e)))?
                .to_string();
            tracing::debug!(from = %url, to = %target, "following redirect");
            return Ok(self.caller.get(&target, &headers).await?.body);
        }
        Ok(result.body)
    }
}
