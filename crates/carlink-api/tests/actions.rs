//! Action sending against a mocked back end.

use std::sync::Arc;

use carlink_api::{
    ActionEvent, ActionStatus, DirectoryFallback, RecordingListener, VehicleApi,
};
use carlink_config::{ActionConfig, Brand, BrandProfile};
use carlink_oauth::{ApiContext, ApiToken, Credentials, IdentityManager, OAuthToken};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIN: &str = "WVWZZZ1KZAW000001";

fn profile(server: &MockServer) -> BrandProfile {
    let mut p = BrandProfile::builtin(Brand::Volkswagen);
    p.api_base_url = format!("{}/fs-car/", server.uri());
    p.pin_challenge_url = format!(
        "{}/api/vehicles/{{2}}/services/{{service}}/operations/{{action}}/security-pin-auth-requested",
        server.uri()
    );
    p.pin_verify_url = format!("{}/api/security-pin-auth-completed", server.uri());
    p
}

fn setup(
    server: &MockServer,
    pin: Option<&str>,
) -> (VehicleApi, Arc<RecordingListener>, Arc<IdentityManager>) {
    let identity = Arc::new(IdentityManager::new());
    let group = identity.generate_session_group().unwrap();
    let ctx = ApiContext::new(
        group.clone(),
        Credentials::new("user@example.com", "secret").with_pin(pin.map(String::from)),
        Arc::new(profile(server)),
    )
    .with_vin(VIN);

    let mut set = identity.token_set(&group).unwrap();
    set.access = ApiToken::from_oauth(
        &OAuthToken {
            access_token: Some("acc".to_string()),
            expires_in: Some(3600),
            ..Default::default()
        },
        3600,
    );
    identity.update_token_set(&group, set).unwrap();

    let listener = Arc::new(RecordingListener::new());
    let api = VehicleApi::new(identity.clone(), ctx, listener.clone(), &ActionConfig::default());
    (api, listener, identity)
}

#[tokio::test]
async fn test_lock_without_pin_is_rejected() {
    let server = MockServer::start().await;
    let (api, listener, _) = setup(&server, None);

    assert_eq!(api.control_lock(true).await, ActionStatus::Rejected);
    assert_eq!(
        listener.events(),
        vec![ActionEvent::Notification {
            service: "rlu_v1".to_string(),
            action: "LOCK".to_string(),
            message: "Action rlu_v1.LOCK requires the SPIN, but it's not configured!".to_string(),
        }]
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_charger_queued_then_second_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/fs-car/bs/batterycharge/v1/VW/DE/vehicles/{}/charger/actions", VIN)))
        .and(header("authorization", "Bearer acc"))
        .and(header("content-type", "application/vnd.vwg.mbb.ChargerAction_v1_0_0+xml"))
        .and(body_string_contains("<type>start</type>"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Vcf-Remaining-Calls", "42")
                .set_body_json(json!({
                    "action": {"type": "start", "actionId": 555, "actionState": "queued"}
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (api, listener, _) = setup(&server, None);

    assert_eq!(api.control_charger(true).await, ActionStatus::InProgress);
    assert!(api.queue().is_request_pending("rbatterycharge_v1"));
    let pending = api.queue().get("555").unwrap();
    assert!(pending.check_url.ends_with(&format!(
        "/fs-car/bs/batterycharge/v1/VW/DE/vehicles/{}/charger/actions/555",
        VIN
    )));

    // A second request for the same service is refused locally
    assert_eq!(api.control_charger(false).await, ActionStatus::Rejected);

    let events = listener.events();
    assert!(events.contains(&ActionEvent::RateLimit(42)));
    assert!(events.contains(&ActionEvent::Sent {
        service: "rbatterycharge_v1".to_string(),
        action: "start".to_string(),
        request_id: "555".to_string(),
    }));
    assert!(matches!(
        events.last(),
        Some(ActionEvent::Notification { message, .. }) if message.contains("already a request pending")
    ));
}

#[tokio::test]
async fn test_pre_heating_exchanges_pin_for_security_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/vehicles/{}/services/rheating_v1/operations/P_QSACT/security-pin-auth-requested",
            VIN
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "securityPinAuthInfo": {
                "securityToken": "st-1",
                "securityPinTransmission": {"challenge": "ABCDEF"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/security-pin-auth-completed"))
        .and(body_partial_json(json!({
            "securityPinAuthentication": {"securityToken": "st-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"securityToken": "granted-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/fs-car/bs/rs/v1/VW/DE/vehicles/{}/climater/actions", VIN)))
        .and(header("x-mbbSecToken", "granted-1"))
        .and(header("content-type", "application/vnd.vwg.mbb.RemoteStandheizung_v2_0_2+json"))
        .and(body_partial_json(json!({
            "performAction": {"quickstart": {"startMode": "heating", "climatisationDuration": 20}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "performActionResponse": {"requestId": "901"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/fs-car/bs/rs/v1/VW/DE/vehicles/{}/requests/901/status", VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestStatusResponse": {"status": "request_in_progress"}
        })))
        .mount(&server)
        .await;

    let (api, listener, _) = setup(&server, Some("1234"));

    assert_eq!(api.control_pre_heating(true, 20).await, ActionStatus::InProgress);
    assert!(api.queue().is_request_pending("rheating_v1"));
    assert!(listener.events().contains(&ActionEvent::Sent {
        service: "rheating_v1".to_string(),
        action: "P_QSACT".to_string(),
        request_id: "901".to_string(),
    }));
}

#[tokio::test]
async fn test_pre_heating_without_pin_is_rejected() {
    let server = MockServer::start().await;
    let (api, listener, _) = setup(&server, None);

    assert_eq!(api.control_ventilation(true, 10).await, ActionStatus::Rejected);
    assert!(matches!(
        listener.events().last(),
        Some(ActionEvent::Notification { service, action, .. })
            if service == "rheating_v1" && action == "P_QSACT"
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_max_charge_and_climater_temp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/fs-car/bs/batterycharge/v1/VW/DE/vehicles/{}/charger/actions", VIN)))
        .and(body_string_contains("<maxChargeCurrent>10</maxChargeCurrent>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": {"type": "setSettings", "actionId": 31, "actionState": "succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/fs-car/bs/climatisation/v1/VW/DE/vehicles/{}/climater/actions", VIN)))
        .and(body_string_contains("<targetTemperature>2952</targetTemperature>"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "action": {"type": "setSettings", "actionId": 32, "actionState": "succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (api, listener, _) = setup(&server, None);

    assert_eq!(api.control_max_charge(10).await, ActionStatus::Successful);
    assert_eq!(api.control_climater_temp(22.0, "electric").await, ActionStatus::Successful);
    assert!(api.queue().is_empty());
    assert!(listener.events().contains(&ActionEvent::Result {
        request_id: "31".to_string(),
        status: "SUCCESSFUL".to_string(),
        raw_status: "succeeded".to_string(),
    }));
}

#[tokio::test]
async fn test_target_charge_level_is_unsupported() {
    let server = MockServer::start().await;
    let (api, listener, _) = setup(&server, None);

    assert_eq!(api.control_target_charge_level(80).await, ActionStatus::Rejected);
    assert_eq!(
        listener.events(),
        vec![ActionEvent::Notification {
            service: "rbatterycharge_v1".to_string(),
            action: "setTargetSoc".to_string(),
            message: "Unsupported function".to_string(),
        }]
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_poll_until_successful() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/fs-car/bs/rhf/v1/VW/DE/vehicles/{}/honkAndFlash", VIN)))
        .and(body_string_contains("\"serviceOperationCode\":\"FLASH_ONLY\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "honkAndFlashRequest": {"id": 77, "status": {"statusCode": "QUEUED"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/fs-car/bs/rhf/v1/VW/DE/vehicles/{}/honkAndFlash/77/status", VIN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"statusCode": "request_successful"}
        })))
        .mount(&server)
        .await;

    let (api, listener, _) = setup(&server, None);

    assert_eq!(
        api.control_honk_flash(false, 48.1, 11.5, 10).await,
        ActionStatus::InProgress
    );
    api.check_pending_requests().await;
    assert!(!api.queue().are_requests_pending());
    assert!(listener.events().contains(&ActionEvent::Result {
        request_id: "77".to_string(),
        status: "SUCCESSFUL".to_string(),
        raw_status: "request_successful".to_string(),
    }));
}

#[tokio::test]
async fn test_backend_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"errorCode": "gw.error.internal", "description": "Internal error"}
        })))
        .mount(&server)
        .await;

    let (api, listener, _) = setup(&server, None);
    assert_eq!(api.control_window_heating(true).await, ActionStatus::Rejected);
    assert!(api.queue().is_empty());
    assert!(matches!(
        listener.events().last(),
        Some(ActionEvent::Notification { service, .. }) if service == "rclima_v1"
    ));
}

#[tokio::test]
async fn test_call_api_follows_one_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fs-car/bs/vsr/v1/VW/DE/vehicles/V/status"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/moved/status"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":1}"#))
        .mount(&server)
        .await;

    let (api, _, _) = setup(&server, None);
    let body = api
        .call_api("bs/vsr/v1/{0}/{1}/vehicles/V/status", "getVehicleStatus")
        .await
        .unwrap();
    assert_eq!(body, r#"{"data":1}"#);
}

#[tokio::test]
async fn test_call_api_offline_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("getVehicleStatus.json"), r#"{"offline":true}"#).unwrap();

    let (api, _, _) = setup(&server, None);
    let api = api.with_fallback(Arc::new(DirectoryFallback::new(dir.path())));

    let body = api.call_api("bs/vsr/v1/{0}/{1}/vehicles/{2}/status", "getVehicleStatus").await.unwrap();
    assert_eq!(body, r#"{"offline":true}"#);

    let err = api.call_api("bs/vsr/v1/{0}/{1}/vehicles/{2}/status", "other").await.unwrap_err();
    assert!(err.is_security());
}
