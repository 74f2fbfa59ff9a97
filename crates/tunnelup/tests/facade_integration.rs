use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tunnelup::{SessionControl, SessionState, UpdateResult, UpdateSettings, run_with_settings};

struct IdleSession {
    disconnects: AtomicUsize,
}

#[async_trait]
impl SessionControl for IdleSession {
    fn state(&self) -> SessionState {
        SessionState::Disconnected
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers every request on a loopback port with the same status and body.
async fn serve(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("loopback listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut head = Vec::new();
            let mut chunk = [0_u8; 1024];
            while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => head.extend_from_slice(&chunk[..read]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    format!("http://{addr}/v1/latest")
}

fn settings_for(endpoint: String) -> UpdateSettings {
    UpdateSettings {
        metadata_endpoint: endpoint,
        connect_timeout_secs: 2,
        read_timeout_secs: 2,
        ..UpdateSettings::default()
    }
}

fn idle_session() -> Arc<IdleSession> {
    Arc::new(IdleSession {
        disconnects: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn no_offer_reports_up_to_date() {
    let endpoint = serve("204 No Content", "").await;
    let session = idle_session();

    let result = run_with_settings(&settings_for(endpoint), session.clone(), "2.4.0", None).await;

    assert_eq!(result, UpdateResult::SuccessNoUpdate);
    assert!(result.is_success());
    assert_eq!(session.disconnects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metadata_failure_reports_http_error() {
    let endpoint = serve("500 Internal Server Error", "boom").await;

    let result = run_with_settings(&settings_for(endpoint), idle_session(), "2.4.0", None).await;

    assert_eq!(result, UpdateResult::HttpError);
}

#[tokio::test]
async fn unsupported_hash_algorithm_is_rejected_before_download() {
    let endpoint = serve(
        "200 OK",
        r#"{"download_url":"http://127.0.0.1:9/x.msi","hash_algorithm":"md5","expected_hash":"00"}"#,
    )
    .await;

    let result = run_with_settings(&settings_for(endpoint), idle_session(), "2.4.0", None).await;

    assert_eq!(result, UpdateResult::InvalidSignature);
}
