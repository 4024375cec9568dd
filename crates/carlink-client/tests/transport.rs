//! Transport tests against a mock HTTP server.

use carlink_client::{ApiHttpClient, Error, Headers, HttpBody};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> ApiHttpClient {
    ApiHttpClient::builder()
        .user_agent("okhttp/3.11.0")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .and(header("user-agent", "okhttp/3.11.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"userVehicles":{"vehicle":["WVW1"]}}"#)
                .insert_header("Vcf-Remaining-Calls", "17"),
        )
        .mount(&server)
        .await;

    let res = client()
        .get(&format!("{}/vehicles", server.uri()), &Headers::new())
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    assert!(res.is_success());
    assert!(res.body.contains("WVW1"));
    assert_eq!(res.rate_limit(), Some(17));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/signin-service/v1/signin"),
        )
        .mount(&server)
        .await;

    let res = client()
        .get(&format!("{}/authorize", server.uri()), &Headers::new())
        .await
        .unwrap();
    assert!(res.is_redirect());
    assert_eq!(res.location.as_deref(), Some("/signin-service/v1/signin"));
}

#[tokio::test]
async fn test_unauthorized_is_security_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client()
        .get(&format!("{}/anything", server.uri()), &Headers::new())
        .await
        .unwrap_err();
    assert!(err.is_security());
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_server_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            r#"{"error":{"errorCode":"gw.error.internal","description":"backend down"}}"#,
        ))
        .mount(&server)
        .await;

    let err = client()
        .post(
            &format!("{}/actions", server.uri()),
            &Headers::new(),
            HttpBody::from("<action/>"),
        )
        .await
        .unwrap_err();
    match err {
        Error::Api {
            status,
            code,
            detail,
            ..
        } => {
            assert_eq!(status, 500);
            assert_eq!(code, "gw.error.internal");
            assert!(detail.is_some());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_form_body_is_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("grant_type=refresh_token&token=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"access_token":"new"}"#))
        .mount(&server)
        .await;

    let res = client()
        .post(
            &format!("{}/token", server.uri()),
            &Headers::new(),
            HttpBody::form([("grant_type", "refresh_token"), ("token", "abc")]),
        )
        .await
        .unwrap();
    assert!(res.body.contains("new"));
}

#[tokio::test]
async fn test_json_body_detected() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let res = client()
        .put(
            &format!("{}/settings", server.uri()),
            &Headers::new(),
            HttpBody::from(r#"{"a":1}"#),
        )
        .await
        .unwrap();
    assert_eq!(res.status, 204);
}

#[tokio::test]
async fn test_explicit_content_type_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header(
            "content-type",
            "application/vnd.vwg.mbb.RemoteLockUnlock_v1_0_0+xml",
        ))
        .respond_with(ResponseTemplate::new(202).set_body_string(
            r#"{"rluActionResponse":{"requestId":"1234"}}"#,
        ))
        .mount(&server)
        .await;

    let mut headers = Headers::new();
    headers.insert(
        "Content-Type".to_string(),
        "application/vnd.vwg.mbb.RemoteLockUnlock_v1_0_0+xml".to_string(),
    );
    let res = client()
        .post(
            &format!("{}/rlu", server.uri()),
            &headers,
            HttpBody::from("<rluAction><action>LOCK</action></rluAction>"),
        )
        .await
        .unwrap();
    assert_eq!(res.status, 202);
}

#[tokio::test]
async fn test_success_status_with_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error":"invalid_grant","error_description":"expired"}"#),
        )
        .mount(&server)
        .await;

    let err = client()
        .post(
            &format!("{}/token", server.uri()),
            &Headers::new(),
            HttpBody::form([("grant_type", "refresh_token")]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 200, .. }));
}
