//! Probe routes
//!
//! Handlers run one probe (or one multi-target run) and map the outcome to a
//! status code. Settings are read from the environment on each request.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use schema::{ErrorKind, ProbeResult, Secret};
use serde::Deserialize;
use sonde_core::config::{parse_timeout, Settings};
use sonde_core::probe::{DatabaseProbe, DirectoryProbe, Engine, Probe, WebProbe};
use sonde_core::report::{render, render_json};
use sonde_core::Runner;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::server::AppState;

/// Challenge sent with every 401 from `/ldap`
pub const AUTH_CHALLENGE: &str = "Basic realm=\"Sonde\", charset=\"UTF-8\"";

/// Which endpoint produced a failure; decides the status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Database,
    Directory,
    Network,
    Web,
}

/// Status code for a failed probe
///
/// `caller_timeout` is true when the request carried its own `timeout`, in
/// which case a deadline overrun is the caller's doing.
pub fn failure_status(surface: Surface, kind: ErrorKind, caller_timeout: bool) -> StatusCode {
    match (surface, kind) {
        (_, ErrorKind::Auth) => StatusCode::UNAUTHORIZED,
        (_, ErrorKind::Timeout) if caller_timeout => StatusCode::BAD_REQUEST,
        (Surface::Network | Surface::Web, ErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        (Surface::Network | Surface::Web, _) => StatusCode::BAD_REQUEST,
        (Surface::Database | Surface::Directory, _) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn probe_routes() -> Router<AppState> {
    Router::new()
        .route("/db/:engine", get(database_check))
        .route("/db/:engine/count/:table", get(database_count))
        .route("/ldap", get(directory_bind))
        .route("/network", get(network_check))
        .route("/url", get(web_check))
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Page not found ...")
}

/// Decoded query string; the last occurrence of a key wins
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// Non-empty value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// `key=value` pairs sorted by key, for logging
    pub fn describe(&self) -> String {
        let mut pairs: Vec<_> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        pairs.join("&")
    }
}

fn load_settings(state: &AppState) -> Result<Settings, Response> {
    state.settings().map_err(|e| {
        warn!("invalid configuration: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
    })
}

/// Caller-supplied `timeout`, or the configured default
fn request_timeout(params: &Params, default: Duration) -> Result<(Duration, bool), Response> {
    match params.get("timeout") {
        None => Ok((default, false)),
        Some(raw) => parse_timeout("timeout", raw)
            .map(|limit| (limit, true))
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response()),
    }
}

async fn database_check(State(state): State<AppState>, Path(engine): Path<String>) -> Response {
    match load_settings(&state) {
        Ok(settings) => database(settings, &engine, None).await,
        Err(response) => response,
    }
}

async fn database_count(
    State(state): State<AppState>,
    Path((engine, table)): Path<(String, String)>,
) -> Response {
    match load_settings(&state) {
        Ok(settings) => database(settings, &engine, Some(table.as_str())).await,
        Err(response) => response,
    }
}

async fn database(settings: Settings, engine: &str, table: Option<&str>) -> Response {
    let engine: Engine = match engine.parse() {
        Ok(engine) => engine,
        Err(e) => {
            warn!("[DB] {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let probe = DatabaseProbe::new(settings.database_config(engine));
    let result = match table {
        Some(table) => probe.count(table).await,
        None => probe.probe().await,
    };
    outcome(&result, Surface::Database, false)
}

async fn directory_bind(
    State(state): State<AppState>,
    credentials: Option<TypedHeader<Authorization<Basic>>>,
) -> Response {
    let Some(TypedHeader(Authorization(basic))) = credentials else {
        return challenge("Authorization required");
    };
    let settings = match load_settings(&state) {
        Ok(settings) => settings,
        Err(response) => return response,
    };
    let config = match settings.directory_config(basic.username(), Secret::new(basic.password())) {
        Ok(config) => config,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let result = DirectoryProbe::new(config, &settings.directory.bind_dn)
        .probe()
        .await;
    if result.challenge() {
        return challenge(result.message());
    }
    outcome(&result, Surface::Directory, false)
}

async fn network_check(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let settings = match load_settings(&state) {
        Ok(settings) => settings,
        Err(response) => return response,
    };
    let (limit, caller_timeout) = match request_timeout(&params, settings.network_timeout) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let report = Runner::default()
        .with_concurrency(settings.network_concurrency)
        .run(
            params.get("host").unwrap_or_default(),
            params.get("port").unwrap_or_default(),
            params.get("protocol").unwrap_or_default(),
            limit,
        )
        .await;

    // an untitled report means resolution failed before any dial
    let status = match (report.title(), report.first_failure()) {
        (None, Some(failure)) => failure_status(Surface::Network, failure.error_kind(), caller_timeout),
        _ => StatusCode::OK,
    };

    if params.get("format") == Some("json") {
        (status, [(CONTENT_TYPE, "application/json")], render_json(&report)).into_response()
    } else {
        (status, render(&report)).into_response()
    }
}

async fn web_check(State(state): State<AppState>, Query(params): Query<Params>) -> Response {
    let settings = match load_settings(&state) {
        Ok(settings) => settings,
        Err(response) => return response,
    };
    let (limit, caller_timeout) = match request_timeout(&params, settings.network_timeout) {
        Ok(pair) => pair,
        Err(response) => return response,
    };

    let url = params.get("test").unwrap_or(settings.test_url.as_str());
    let probe = WebProbe::new(url, limit);
    info!("[URL] Testing {}", probe.display_url());

    let result = probe.probe().await;
    outcome(&result, Surface::Web, caller_timeout)
}

/// Map a single probe result to a response
fn outcome(result: &ProbeResult, surface: Surface, caller_timeout: bool) -> Response {
    let status = if result.success() {
        result
            .status()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK)
    } else {
        failure_status(surface, result.error_kind(), caller_timeout)
    };
    (status, result.message().to_string()).into_response()
}

fn challenge(body: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, AUTH_CHALLENGE)],
        body.to_string(),
    )
        .into_response()
}
