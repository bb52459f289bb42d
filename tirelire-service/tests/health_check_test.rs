mod common;

use axum::http::StatusCode;
use common::TestApp;
use tirelire_service::config::SwaggerMode;

#[tokio::test]
async fn health_reports_datastore_up() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["datastore"], "up");
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::util::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert!(response.headers().contains_key("x-content-type-options"));
}

#[tokio::test]
async fn openapi_document_is_served_in_dev() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/.well-known/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/service/kyc/admin/validate").is_some());
    assert!(body["components"]["securitySchemes"]
        .get("bearer_auth")
        .is_some());
}

#[tokio::test]
async fn openapi_document_is_hidden_in_prod_when_disabled() {
    let app = TestApp::builder()
        .config(|config| {
            config.environment = tirelire_service::config::Environment::Prod;
            config.swagger.enabled = SwaggerMode::Disabled;
        })
        .build()
        .await;

    let (status, _) = app.get("/.well-known/openapi.json", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
