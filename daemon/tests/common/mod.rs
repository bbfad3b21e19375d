//! Test utilities for integration tests in the daemon crate.

#![allow(dead_code)]

use daemon::{Daemon, DaemonConfig};
use hyper::{Body, Client, HeaderMap, Request, StatusCode};
use sonde_core::EnvLookup;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Run the given future with a timeout, failing the test if it elapses.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Run a future with a default timeout of 60 seconds.
pub async fn run_with_default_timeout<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    run_with_timeout(Duration::from_secs(60), fut).await
}

/// Environment built from fixed pairs instead of the process environment
pub fn env_from(vars: &[(&str, &str)]) -> EnvLookup {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(move |key: &str| map.get(key).cloned())
}

/// A daemon serving on an ephemeral local port
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<daemon::Result<()>>,
}

impl TestServer {
    pub async fn start(vars: &[(&str, &str)]) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind daemon");
        let addr = listener.local_addr().expect("daemon addr");
        let (tx, rx) = oneshot::channel::<()>();

        let daemon = Daemon::new(DaemonConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        })
        .with_env(env_from(vars));
        let handle = tokio::spawn(async move {
            daemon
                .serve(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET `path`, optionally with an `Authorization` header
    pub async fn get(&self, path: &str, authorization: Option<&str>) -> (StatusCode, HeaderMap, String) {
        let mut req = Request::builder().uri(self.url(path));
        if let Some(value) = authorization {
            req = req.header(hyper::header::AUTHORIZATION, value);
        }
        let req = req.body(Body::empty()).expect("request");

        let response = Client::new().request(req).await.expect("daemon response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .expect("body");
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = run_with_timeout(Duration::from_secs(10), &mut self.handle)
            .await
            .expect("server task");
        result.expect("server exits cleanly");
    }
}

/// A local port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

/// A local port that accepts and drops connections
pub async fn listening_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move { while listener.accept().await.is_ok() {} });
    port
}

/// Minimal LDAP server answering every bind request with `result_code`
pub async fn fake_directory(result_code: u8) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let Some(id) = message_id(&buf[..n]) else { return };
                // LDAPMessage { messageID, BindResponse { resultCode, "", "" } }
                let mut reply = vec![0x30, (2 + id.len() + 9) as u8, 0x02, id.len() as u8];
                reply.extend_from_slice(&id);
                reply.extend_from_slice(&[0x61, 0x07, 0x0a, 0x01, result_code, 0x04, 0x00, 0x04, 0x00]);
                let _ = stream.write_all(&reply).await;
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    port
}

fn message_id(frame: &[u8]) -> Option<Vec<u8>> {
    if frame.first() != Some(&0x30) {
        return None;
    }
    let len_byte = *frame.get(1)?;
    let mut pos = 2;
    if len_byte & 0x80 != 0 {
        pos += (len_byte & 0x7f) as usize;
    }
    if frame.get(pos) != Some(&0x02) {
        return None;
    }
    let id_len = *frame.get(pos + 1)? as usize;
    frame.get(pos + 2..pos + 2 + id_len).map(<[u8]>::to_vec)
}

/// `Authorization` header value for HTTP Basic auth
pub fn basic_auth(user: &str, password: &str) -> String {
    use base64::Engine as _;
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"))
    )
}

/// Percent-encode a value for use in a query string
pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
