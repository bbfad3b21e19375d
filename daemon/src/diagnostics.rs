//! Diagnostic routes
//!
//! These never probe anything. They describe the daemon itself and the
//! request it received, which helps when debugging proxies and load
//! balancers in front of it.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, OriginalUri, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sonde_core::config::parse_timeout;
use sonde_core::{redact, CoreError};
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};
use sysinfo::Networks;
use tracing::{info, warn};

use crate::routes::Params;
use crate::server::AppState;

pub fn diagnostic_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/healthcheck", get(healthcheck))
        .route("/whoami", get(whoami))
        .route("/echo", get(echo).post(echo))
}

#[derive(Debug, Serialize)]
struct Pong {
    #[serde(skip_serializing_if = "String::is_empty")]
    hostname: String,
    date: u64,
    message: &'static str,
}

async fn ping(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let pong = Pong {
        hostname: state.var("HOSTNAME").unwrap_or_default(),
        date: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        message: "pong",
    };

    if params.get("format") == Some("json") {
        Json(pong).into_response()
    } else {
        format!("Hostname: {}\nDate: {}\nMessage: {}", pong.hostname, pong.date, pong.message)
            .into_response()
    }
}

async fn healthcheck(Query(params): Query<Params>) -> Response {
    let raw = params.get("code").unwrap_or("200");
    match raw.parse::<u16>().ok().and_then(|c| StatusCode::from_u16(c).ok()) {
        Some(status) => {
            if status != StatusCode::OK {
                info!("Update health check status code [{}]", status.as_u16());
            }
            (status, format!("Healthcheck return code: {}", status.as_u16())).into_response()
        }
        None => {
            warn!("invalid health check code '{}'", raw);
            let err = CoreError::ValidationError(format!("invalid status code '{raw}'"));
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Host name, local addresses, peer address and a dump of the request
///
/// `wait` delays the answer, to exercise client and proxy timeouts.
async fn whoami(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    Query(params): Query<Params>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    version: Version,
    headers: HeaderMap,
) -> Response {
    if let Some(raw) = params.get("wait") {
        match parse_timeout("wait", raw) {
            Ok(wait) => {
                info!("[WHOAMI] wait to : {}", humantime::format_duration(wait));
                tokio::time::sleep(wait).await;
            }
            Err(e) => warn!("[WHOAMI] {}", e),
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Hostname: {}", state.var("HOSTNAME").unwrap_or_default());
    for ip in interface_addresses() {
        let _ = writeln!(out, "IP: {ip}");
    }
    match peer {
        Some(ConnectInfo(addr)) => {
            let _ = writeln!(out, "RemoteAddr: {addr}");
        }
        None => out.push_str("RemoteAddr: unknown\n"),
    }

    let _ = write!(out, "{method} {uri} {version:?}\r\n");
    for (name, value) in &headers {
        let _ = write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
    }
    out.push_str("\r\n");

    // Authorization headers and userinfo in the request line are masked
    redact::scrub(&out, &[]).into_response()
}

/// Addresses of every local interface, ordered by interface name
fn interface_addresses() -> Vec<IpAddr> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<_> = networks.list().iter().collect();
    interfaces.sort_by(|a, b| a.0.cmp(b.0));
    interfaces
        .into_iter()
        .flat_map(|(_, data)| data.ip_networks().iter().map(|net| net.addr))
        .collect()
}

/// Log the query and body, then answer with `code` (default 200)
async fn echo(Query(params): Query<Params>, body: Bytes) -> Response {
    let status = params
        .get("code")
        .and_then(|c| c.parse::<u16>().ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::OK);

    info!("[ECHO] query: {}", redact::scrub(&params.describe(), &[]));
    if !body.is_empty() {
        info!("[ECHO] body: {}", redact::scrub(&String::from_utf8_lossy(&body), &[]));
    }

    (status, "OK message received !").into_response()
}
