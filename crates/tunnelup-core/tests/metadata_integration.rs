mod support;

use support::{Reply, TestServer};
use tunnelup_core::{HttpMetadataSource, MetadataError, MetadataSource, UpdateDescriptor};

const OFFER: &str = r#"{
    "version": "2.5.0",
    "download_url": "https://downloads.example.com/tunnelup-2.5.0-x64.msi",
    "hash_algorithm": "sha512",
    "expected_hash": "00ff"
}"#;

async fn query(reply: Reply, current_version: &str) -> Result<Option<UpdateDescriptor>, MetadataError> {
    let server = TestServer::start(vec![reply]).await;
    let source = HttpMetadataSource::new(reqwest::Client::new(), server.url("/v1/latest"));
    source.query_update(current_version).await
}

#[tokio::test]
async fn offer_for_newer_version_becomes_descriptor() {
    let descriptor = query(Reply::ok(OFFER), "2.4.0")
        .await
        .expect("query should succeed")
        .expect("an update should be offered");

    assert_eq!(
        descriptor,
        UpdateDescriptor {
            download_url: "https://downloads.example.com/tunnelup-2.5.0-x64.msi".to_string(),
            hash_algorithm: "sha512".to_string(),
            expected_hash: "00ff".to_string(),
        }
    );
}

#[tokio::test]
async fn offer_without_version_is_trusted() {
    let body = r#"{"download_url":"https://d.example.com/x.msi","hash_algorithm":"sha512","expected_hash":"aa"}"#;
    let descriptor = query(Reply::ok(body), "2.4.0")
        .await
        .expect("query should succeed");
    assert!(descriptor.is_some());
}

#[tokio::test]
async fn offer_for_same_or_older_version_is_ignored() {
    assert_eq!(
        query(Reply::ok(OFFER), "v2.5.0").await.expect("query should succeed"),
        None
    );
    assert_eq!(
        query(Reply::ok(OFFER), "2.6.1").await.expect("query should succeed"),
        None
    );
}

#[tokio::test]
async fn no_content_and_null_mean_up_to_date() {
    assert_eq!(
        query(Reply::Status(204, Vec::new()), "2.4.0")
            .await
            .expect("query should succeed"),
        None
    );
    assert_eq!(
        query(Reply::ok("null"), "2.4.0")
            .await
            .expect("query should succeed"),
        None
    );
}

#[tokio::test]
async fn error_status_carries_body_snippet() {
    let error = query(Reply::Status(503, b"maintenance".to_vec()), "2.4.0")
        .await
        .expect_err("503 should fail");

    assert!(matches!(
        error,
        MetadataError::HttpStatus { status, ref body_snippet }
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE && body_snippet == ": maintenance"
    ));
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let error = query(Reply::ok("{\"download_url\": 5}"), "2.4.0")
        .await
        .expect_err("malformed body should fail");
    assert!(matches!(error, MetadataError::Parse(_)));
}

#[tokio::test]
async fn unreachable_service_is_request_error() {
    let server = TestServer::start(vec![Reply::Reset]).await;
    let source = HttpMetadataSource::new(reqwest::Client::new(), server.url("/v1/latest"));
    let error = source
        .query_update("2.4.0")
        .await
        .expect_err("closed connection should fail");
    assert!(matches!(error, MetadataError::Request(_)));
}
