//! Integration tests for multi-file uploads

use std::time::Duration;

use campusdesk_api::{upload::UploadGateway, ApiError};
use campusdesk_core::config::UploadConfig;
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock,
};

use crate::common::{self, error_response, sample_file, upload_ok};

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let h = common::setup_signed_in().await;

    let results = h.gateway.upload_files(&[], None).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let h = common::setup_signed_in().await;

    // the first file answers last
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"one.pdf\""))
        .respond_with(upload_ok("course-files", "one.pdf").set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"two.pdf\""))
        .respond_with(upload_ok("course-files", "two.pdf").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"three.pdf\""))
        .respond_with(upload_ok("course-files", "three.pdf"))
        .expect(1)
        .mount(&h.server)
        .await;

    let files = vec![
        sample_file("one.pdf"),
        sample_file("two.pdf"),
        sample_file("three.pdf"),
    ];
    let results = h
        .gateway
        .upload_files(&files, Some("course-files"))
        .await
        .expect("Batch upload failed");

    let keys: Vec<_> = results.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["course-files/one.pdf", "course-files/two.pdf", "course-files/three.pdf"]
    );
}

#[tokio::test]
async fn test_batch_fails_when_any_file_fails() {
    let h = common::setup_signed_in().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"ok.pdf\""))
        .respond_with(upload_ok("program-resources", "ok.pdf"))
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("filename=\"bad.exe\""))
        .respond_with(error_response(415, "File type not allowed"))
        .mount(&h.server)
        .await;

    let files = vec![sample_file("ok.pdf"), sample_file("bad.exe")];
    let err = h.gateway.upload_files(&files, None).await.unwrap_err();

    assert!(matches!(err, ApiError::UploadFailed(ref m) if m == "File type not allowed"));
}

#[tokio::test]
async fn test_batch_honors_upload_config() {
    let h = common::setup_signed_in().await;
    let gateway = UploadGateway::new(h.api.clone(), h.renewer.clone()).with_upload_config(
        &UploadConfig {
            default_folder: "archive".to_string(),
            max_concurrent: 1,
        },
    );

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("name=\"folder\"\r\n\r\narchive"))
        .respond_with(upload_ok("archive", "a.pdf").set_delay(Duration::from_millis(50)))
        .expect(3)
        .mount(&h.server)
        .await;

    let files = vec![sample_file("a.pdf"), sample_file("b.pdf"), sample_file("c.pdf")];
    let results = gateway.upload_files(&files, None).await.unwrap();

    assert_eq!(gateway.default_folder(), "archive");
    assert_eq!(results.len(), 3);
}
