//! HTTP server

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use sonde_core::config::{process_env, EnvLookup, Settings};
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, info_span, Level};

use crate::{diagnostics, routes};
use crate::{DaemonError, Result};

/// Listen address of the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl DaemonConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    env: EnvLookup,
}

impl AppState {
    pub fn new(env: EnvLookup) -> Self {
        Self { env }
    }

    /// Probe settings, read fresh for each request
    pub fn settings(&self) -> sonde_core::Result<Settings> {
        Settings::load(&self.env)
    }

    /// A single environment value
    pub fn var(&self, key: &str) -> Option<String> {
        (self.env)(key)
    }
}

/// Build the application router
///
/// Every route answers at its bare path and again under `/v1`.
pub fn app(env: EnvLookup) -> Router {
    let api = || {
        Router::new()
            .merge(routes::probe_routes())
            .merge(diagnostics::diagnostic_routes())
    };

    Router::new()
        .merge(api())
        .nest("/v1", api())
        .fallback(routes::not_found)
        .with_state(AppState::new(env))
        .layer(
            TraceLayer::new_for_http()
                // the query string may carry credentials (`/url?test=`), so only the path is recorded
                .make_span_with(|req: &Request<Body>| {
                    info_span!("request", method = %req.method(), path = %req.uri().path())
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The HTTP daemon serving probe routes
pub struct Daemon {
    config: DaemonConfig,
    env: EnvLookup,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Daemon {
    /// Create a daemon reading probe settings from the process environment
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            env: process_env(),
        }
    }

    /// Replace the source of probe settings
    #[must_use]
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Bind the configured address and serve until `shutdown` resolves
    ///
    /// # Errors
    /// Returns an error if the listener cannot be bound or the server fails.
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .map_err(|e| DaemonError::ServerError(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;
        let local: SocketAddr = listener.local_addr()?;

        let service = app(self.env.clone()).into_make_service_with_connect_info::<SocketAddr>();
        info!("Sonde listening on http://{}", local);

        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Sonde stopped");
        Ok(())
    }
}
