//! Integration tests for single-file uploads
//!
//! Covers the first-attempt paths, the one-shot renewal after 401 and the
//! session termination that follows a failed renewal.

use std::{sync::Arc, time::Duration};

use campusdesk_api::{client::ApiClient, upload::UploadGateway, ApiError, ErrorKind};
use campusdesk_core::{
    domain::{CredentialPair, UploadFile},
    ports::ICredentialProvider,
};
use wiremock::{
    matchers::{body_json, body_string_contains, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common::{
    self, error_response, refresh_ok, sample_file, upload_ok, NoAuthHeader, ACCESS_1, ACCESS_2,
    REFRESH_1, REFRESH_2,
};

// ============================================================================
// First attempt
// ============================================================================

#[tokio::test]
async fn test_upload_succeeds_on_first_attempt() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_string_contains("name=\"file\"; filename=\"syllabus.pdf\""))
        .and(body_string_contains("%PDF-1.4 campusdesk"))
        .respond_with(upload_ok("program-resources", "syllabus.pdf"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(0)
        .mount(&h.server)
        .await;

    let result = h
        .gateway
        .upload_file(&sample_file("syllabus.pdf"), None)
        .await
        .expect("Upload failed");

    assert_eq!(result.key, "program-resources/syllabus.pdf");
    assert_eq!(result.url, "https://cdn.example.edu/program-resources/syllabus.pdf");
    assert_eq!(result.original_name, "syllabus.pdf");
    assert_eq!(result.mime_type, "application/pdf");
    assert_eq!(h.store.access_token().as_deref(), Some(ACCESS_1));
}

#[tokio::test]
async fn test_upload_uses_default_folder() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("name=\"folder\"\r\n\r\nprogram-resources"))
        .respond_with(upload_ok("program-resources", "a.pdf"))
        .expect(2)
        .mount(&h.server)
        .await;

    h.gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .expect("Upload without folder failed");
    h.gateway
        .upload_file(&sample_file("a.pdf"), Some(""))
        .await
        .expect("Upload with empty folder failed");
}

#[tokio::test]
async fn test_upload_to_named_folder() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("name=\"folder\"\r\n\r\nevent-media"))
        .respond_with(upload_ok("event-media", "poster.png"))
        .expect(1)
        .mount(&h.server)
        .await;

    let file = UploadFile::new("poster.png", "image/png", b"PNG-DATA".to_vec());
    let result = h
        .gateway
        .upload_file(&file, Some("event-media"))
        .await
        .expect("Upload failed");

    assert_eq!(result.key, "event-media/poster.png");
}

#[tokio::test]
async fn test_anonymous_upload_sends_no_auth_header() {
    let h = common::setup(None).await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(NoAuthHeader)
        .respond_with(upload_ok("program-resources", "open.pdf"))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h.gateway.upload_file(&sample_file("open.pdf"), None).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_missing_file_rejected_without_request() {
    let h = common::setup_signed_in().await;

    let err = h
        .gateway
        .upload_file(&sample_file(""), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "No file provided");
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn test_server_error_message_is_surfaced() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(error_response(413, "File too large"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("huge.pdf"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UploadFailed(ref m) if m == "File too large"));
    assert!(h.expirations().is_empty());
}

#[tokio::test]
async fn test_non_json_error_uses_generic_message() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UploadFailed);
    assert_eq!(err.to_string(), "Upload failed with status 502");
}

#[tokio::test]
async fn test_unauthorized_without_token_does_not_renew() {
    let h = common::setup(None).await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(error_response(401, "Authentication required"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UploadFailed(ref m) if m == "Authentication required"));
    assert!(h.expirations().is_empty());
}

// ============================================================================
// Renewal after 401
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_renewed_and_retried() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(serde_json::json!({ "refreshToken": REFRESH_1 })))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-2"))
        .and(body_string_contains("%PDF-1.4 campusdesk"))
        .respond_with(upload_ok("program-resources", "syllabus.pdf"))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .gateway
        .upload_file(&sample_file("syllabus.pdf"), None)
        .await
        .expect("Upload after renewal failed");

    assert_eq!(result.key, "program-resources/syllabus.pdf");
    assert_eq!(h.store.access_token().as_deref(), Some(ACCESS_2));
    assert_eq!(h.store.refresh_token().as_deref(), Some(REFRESH_2));

    let session = h.store.session().expect("session should be stored");
    assert_eq!(session.user.unwrap()["email"], "staff@example.edu");
    assert!(h.expirations().is_empty());
}

#[tokio::test]
async fn test_unrotated_refresh_token_is_kept() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(error_response(401, "Token expired"))
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, None))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(upload_ok("program-resources", "a.pdf"))
        .mount(&h.server)
        .await;

    h.gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .expect("Upload after renewal failed");

    assert_eq!(h.store.access_token().as_deref(), Some(ACCESS_2));
    assert_eq!(h.store.refresh_token().as_deref(), Some(REFRESH_1));
}

#[tokio::test]
async fn test_retry_failure_is_final() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(error_response(401, "Account disabled"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::UploadFailed(ref m) if m == "Account disabled"));
    // the retry's 401 does not end the session
    assert!(h.expirations().is_empty());
    assert_eq!(h.store.access_token().as_deref(), Some(ACCESS_2));
}

#[tokio::test]
async fn test_retry_transport_error_is_upload_failure() {
    let h = common::setup_signed_in().await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let api = Arc::new(ApiClient::with_http_client(
        client,
        h.server.uri(),
        h.store.clone(),
    ));
    let gateway = UploadGateway::new(api, h.renewer.clone());

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(1)
        .mount(&h.server)
        .await;

    // the retry outlives the client timeout
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(upload_ok("program-resources", "a.pdf").set_delay(Duration::from_secs(3)))
        .mount(&h.server)
        .await;

    let err = gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UploadFailed);
    assert!(matches!(err, ApiError::UploadFailed(ref m) if !m.is_empty()));
    assert!(h.expirations().is_empty());
}

#[tokio::test]
async fn test_failed_renewal_ends_session() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(error_response(401, "Refresh token revoked"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::AuthExpired(ref m) if m == "Token expired"));
    assert!(err.ended_session());
    assert!(h.store.credentials().is_none());

    let events = h.expirations();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].redirect_to, "/login");
    assert_eq!(events[0].reason, "Refresh token revoked");
}

#[tokio::test]
async fn test_missing_refresh_token_ends_session_without_exchange() {
    let h = common::setup(Some(CredentialPair::access_only(ACCESS_1))).await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, Some(REFRESH_2)))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthExpired);
    assert_eq!(err.to_string(), "Token expired");
    assert!(h.store.access_token().is_none());
    assert_eq!(h.expirations().len(), 1);
}

#[tokio::test]
async fn test_malformed_refresh_response_ends_session() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "user": null }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h
        .gateway
        .upload_file(&sample_file("a.pdf"), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthExpired);
    assert!(h.store.credentials().is_none());
    assert_eq!(h.terminator.termination_count(), 1);
}
