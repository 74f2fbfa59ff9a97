#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted answer from the loopback responder.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Full response with a `Content-Length` header.
    Status(u16, Vec<u8>),
    /// 200 without `Content-Length`; the body ends when the socket closes.
    Unframed(Vec<u8>),
    /// Declares `declared` bytes but sends only `body`, then closes.
    Truncated { declared: usize, body: Vec<u8> },
    /// Read the request and close without answering.
    Reset,
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::Status(200, body.into())
    }
}

/// Minimal HTTP/1.1 responder on 127.0.0.1 replaying `Reply`s in order; the
/// last one repeats once the script runs out.
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "responder needs at least one reply");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("loopback listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies[index.min(replies.len() - 1)].clone();
                tokio::spawn(answer(stream, reply));
            }
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn answer(mut stream: TcpStream, reply: Reply) {
    read_request_head(&mut stream).await;

    let response = match reply {
        Reply::Reset => return,
        Reply::Status(status, body) => {
            let mut head = format!(
                "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reason(status),
                body.len()
            )
            .into_bytes();
            head.extend_from_slice(&body);
            head
        }
        Reply::Unframed(body) => {
            let mut head = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_vec();
            head.extend_from_slice(&body);
            head
        }
        Reply::Truncated { declared, body } => {
            let mut head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
            )
            .into_bytes();
            head.extend_from_slice(&body);
            head
        }
    };

    let _ = stream.write_all(&response).await;
    let _ = stream.shutdown().await;
}

async fn read_request_head(stream: &mut TcpStream) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    while !buffer.windows(4).any(|window| window == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        404 => "Not Found",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

pub fn sha512_hex(bytes: &[u8]) -> String {
    use sha2::Digest;
    hex::encode(sha2::Sha512::digest(bytes))
}
