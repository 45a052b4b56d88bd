//! Integration tests for the storage helper endpoints
//!
//! Helpers attach the current bearer token but never renew credentials.

use campusdesk_api::{ApiError, ErrorKind};
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common::{self, error_response, refresh_ok, NoAuthHeader, ACCESS_2};

#[tokio::test]
async fn test_delete_file_sends_key_in_body() {
    let h = common::setup_signed_in().await;

    let response = serde_json::json!({ "success": true, "message": "File deleted" });
    Mock::given(method("DELETE"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_json(serde_json::json!({ "key": "program-resources/old.pdf" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response.clone()))
        .expect(1)
        .mount(&h.server)
        .await;

    let body = h
        .gateway
        .delete_file("program-resources/old.pdf")
        .await
        .expect("Delete failed");

    assert_eq!(body, response);
}

#[tokio::test]
async fn test_get_status_returns_body_unmodified() {
    let h = common::setup_signed_in().await;

    let status = serde_json::json!({
        "success": true,
        "data": { "provider": "s3", "bucket": "campus-assets", "configured": true }
    });
    Mock::given(method("GET"))
        .and(path("/api/upload/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status.clone()))
        .expect(1)
        .mount(&h.server)
        .await;

    assert_eq!(h.gateway.get_status().await.unwrap(), status);
}

#[tokio::test]
async fn test_connection_check() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload/test"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Storage reachable"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let body = h.gateway.test_connection().await.unwrap();
    assert_eq!(body["message"], "Storage reachable");
}

#[tokio::test]
async fn test_helpers_omit_auth_header_when_signed_out() {
    let h = common::setup(None).await;

    Mock::given(method("GET"))
        .and(path("/api/upload/status"))
        .and(NoAuthHeader)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
        .expect(1)
        .mount(&h.server)
        .await;

    assert!(h.gateway.get_status().await.is_ok());
}

#[tokio::test]
async fn test_presigned_url_encodes_key() {
    let h = common::setup_signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/upload/presigned-url"))
        .and(query_param("key", "program-resources/a b&c.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": { "url": "https://bucket.example.edu/signed?sig=abc", "expiresIn": 3600 }
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let presigned = h
        .gateway
        .get_presigned_url("program-resources/a b&c.pdf")
        .await
        .expect("Presign failed");

    assert_eq!(presigned.url, "https://bucket.example.edu/signed?sig=abc");
    assert_eq!(presigned.expires_in, 3600);
}

#[tokio::test]
async fn test_presigned_url_without_data_is_invalid() {
    let h = common::setup_signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/upload/presigned-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "error": "Presigning not supported"
        })))
        .mount(&h.server)
        .await;

    let err = h.gateway.get_presigned_url("k").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.to_string().contains("Presigning not supported"));
}

#[tokio::test]
async fn test_helper_unauthorized_does_not_renew() {
    let h = common::setup_signed_in().await;

    Mock::given(method("GET"))
        .and(path("/api/upload/status"))
        .respond_with(error_response(401, "Token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(refresh_ok(ACCESS_2, None))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.gateway.get_status().await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token expired"));
    assert!(h.expirations().is_empty());
}

#[tokio::test]
async fn test_helper_error_status() {
    let h = common::setup_signed_in().await;

    Mock::given(method("DELETE"))
        .and(path("/api/upload"))
        .respond_with(error_response(404, "Key not found"))
        .mount(&h.server)
        .await;

    let err = h.gateway.delete_file("missing").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::RequestFailed { status: 404, ref message } if message == "Key not found"
    ));
}

#[tokio::test]
async fn test_proxy_url_is_pure() {
    let h = common::setup_signed_in().await;

    let url = h.gateway.get_proxy_url("program-resources/a b.pdf");

    assert_eq!(
        url,
        format!(
            "{}/api/upload/proxy/program-resources%2Fa%20b.pdf",
            h.server.uri()
        )
    );
    assert_eq!(h.request_count().await, 0);
}
