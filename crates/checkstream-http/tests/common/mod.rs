//! A minimal Icinga 2 API stand-in for integration tests.
//!
//! Speaks just enough HTTP/1.1 over a raw `TcpListener`: event-stream
//! requests are answered from a queue of scripted replies, written with
//! chunked encoding in small chunks so that lines arrive split across reads;
//! object lookups are answered from a path → response map.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use checkstream_http::{IcingaConfig, Scheme};

/// How to answer one `/v1/events` request.
#[derive(Debug, Clone)]
pub enum StreamReply {
    /// Send the body, then end the response and close the connection.
    Close(String),
    /// Send the body, then keep the response open until the client leaves.
    Hold(String),
    /// Answer with a non-streaming status response.
    Status(u16, String),
}

#[derive(Default)]
struct Shared {
    replies: Mutex<VecDeque<StreamReply>>,
    lookups: Mutex<HashMap<String, (u16, String)>>,
    heads: Mutex<Vec<String>>,
    stream_requests: AtomicUsize,
}

pub struct MockIcinga {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockIcinga {
    /// Bind to an ephemeral port and start serving. Once `replies` is used
    /// up, further stream requests are held open with an empty body.
    pub async fn start(replies: Vec<StreamReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        });

        let server = shared.clone();
        tokio::spawn(async move {
            while let Ok((conn, _)) = listener.accept().await {
                tokio::spawn(serve(conn, server.clone()));
            }
        });

        Self { addr, shared }
    }

    /// Answer `GET <path>` with `status` and `body`.
    pub fn lookup(&self, path: &str, status: u16, body: &str) {
        self.shared
            .lookups
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Request heads seen so far, in arrival order.
    pub fn heads(&self) -> Vec<String> {
        self.shared.heads.lock().unwrap().clone()
    }

    pub fn stream_requests(&self) -> usize {
        self.shared.stream_requests.load(Ordering::SeqCst)
    }

    /// Plain-HTTP client configuration pointing at this server.
    pub fn config(&self) -> IcingaConfig {
        IcingaConfig {
            server: self.addr.to_string(),
            scheme: Scheme::Http,
            user: "root".into(),
            password: "icinga".into(),
            lookup_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }
}

/// Lookup envelope carrying `tags`.
pub fn tags_body(tags: &[&str]) -> String {
    serde_json::json!({ "results": [{ "attrs": { "vars": { "tags": tags } } }] }).to_string()
}

async fn serve(mut conn: TcpStream, shared: Arc<Shared>) {
    let Some(head) = read_head(&mut conn).await else {
        return;
    };
    shared.heads.lock().unwrap().push(head.clone());

    let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let path = target.split('?').next().unwrap_or("/");

    if path == "/v1/events" {
        shared.stream_requests.fetch_add(1, Ordering::SeqCst);
        let reply = shared
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamReply::Hold(String::new()));
        match reply {
            StreamReply::Status(status, body) => {
                let _ = write_full(&mut conn, status, &body).await;
            }
            StreamReply::Close(body) => {
                if write_chunked(&mut conn, &body).await.is_ok() {
                    let _ = conn.write_all(b"0\r\n\r\n").await;
                }
                let _ = conn.shutdown().await;
            }
            StreamReply::Hold(body) => {
                if write_chunked(&mut conn, &body).await.is_ok() {
                    // Park until the client drops the connection.
                    let mut sink = [0u8; 256];
                    while let Ok(n) = conn.read(&mut sink).await {
                        if n == 0 {
                            break;
                        }
                    }
                }
            }
        }
        return;
    }

    let (status, body) = shared
        .lookups
        .lock()
        .unwrap()
        .get(path)
        .cloned()
        .unwrap_or_else(|| (404, r#"{"error":404,"status":"No objects found."}"#.to_string()));
    let _ = write_full(&mut conn, status, &body).await;
}

async fn read_head(conn: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = conn.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end]).into_owned());
        }
    }
}

async fn write_full(conn: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    conn.write_all(response.as_bytes()).await?;
    conn.shutdown().await
}

async fn write_chunked(conn: &mut TcpStream, body: &str) -> std::io::Result<()> {
    conn.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n",
    )
    .await?;
    for piece in body.as_bytes().chunks(7) {
        conn.write_all(format!("{:x}\r\n", piece.len()).as_bytes()).await?;
        conn.write_all(piece).await?;
        conn.write_all(b"\r\n").await?;
        conn.flush().await?;
    }
    Ok(())
}
