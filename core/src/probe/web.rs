//! HTTP reachability probing

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use schema::{ProbeResult, ProbeSubject};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};
use url::Url;

use super::{error_chain, finish, Probe, ProbeError};
use crate::redact;

/// Web probe that issues a GET and reports whatever status comes back
///
/// Any HTTP response, including 4xx and 5xx, counts as reachable; only
/// transport errors (DNS, refused, TLS, timeout) fail the probe.
///
/// # Example
///
/// ```rust
/// use sonde_core::probe::{Probe, WebProbe};
/// use std::time::Duration;
///
/// # async fn example() {
/// let probe = WebProbe::new("http://127.0.0.1:8080/health", Duration::from_secs(5));
/// let result = probe.probe().await;
/// println!("{:?} {}", result.status(), result.message());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebProbe {
    /// URL to request, userinfo included
    url: String,
    /// `url` with any password masked; the only form that is logged or reported
    display: String,
    /// Password found in the URL userinfo
    password: Option<String>,
    /// Request timeout
    timeout: Duration,
}

impl WebProbe {
    /// Create a new web probe
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        let password = Url::parse(url.trim())
            .ok()
            .and_then(|parsed| parsed.password().map(str::to_string))
            .filter(|p| !p.is_empty());
        let display = redact::scrub(&url, &password.as_deref().into_iter().collect::<Vec<_>>());
        Self {
            url,
            display,
            password,
            timeout,
        }
    }

    /// Get the target URL, credentials masked
    pub fn display_url(&self) -> &str {
        &self.display
    }

    fn client() -> Client<HttpsConnector<HttpConnector>, Body> {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        Client::builder().build(https)
    }

    /// Send the request and return the upstream status
    async fn fetch(&self) -> Result<StatusCode, ProbeError> {
        debug!("web probe requesting {}", self.display);

        let uri: Uri = self.url.trim().parse().map_err(|e| self.invalid(e))?;
        if uri.host().is_none() {
            return Err(self.invalid("missing host"));
        }

        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .map_err(|e| self.invalid(e))?;

        let response = match timeout(self.timeout, Self::client().request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(hyper_error)) => {
                debug!("web probe to {} failed: {}", self.display, hyper_error);
                return Err(ProbeError::Dial(error_chain(&hyper_error)));
            }
            Err(_elapsed) => {
                debug!("web probe to {} timed out after {:?}", self.display, self.timeout);
                return Err(ProbeError::Timeout(self.timeout));
            }
        };

        let status = response.status();
        info!("[URL] Response Status: {}", status);
        Ok(status)
    }

    fn invalid(&self, reason: impl fmt::Display) -> ProbeError {
        ProbeError::Resolve(format!("invalid url {}: {reason}", self.display))
    }

    fn describe(&self, status: StatusCode) -> String {
        format!("{} Return code : {}", self.display, status)
    }
}

#[async_trait]
impl Probe for WebProbe {
    fn subject(&self) -> ProbeSubject {
        ProbeSubject::Url(self.display.clone())
    }

    fn secrets(&self) -> Vec<&str> {
        self.password.as_deref().into_iter().collect()
    }

    async fn check(&self) -> Result<String, ProbeError> {
        self.fetch().await.map(|status| self.describe(status))
    }

    fn failure_message(&self, err: &ProbeError) -> String {
        format!("Error sending request to {} : {}", self.display, err)
    }

    async fn probe(&self) -> ProbeResult {
        match self.fetch().await {
            Ok(status) => {
                let message = redact::scrub(&self.describe(status), &self.secrets());
                ProbeResult::responded(self.subject(), status.as_u16(), message)
            }
            Err(err) => finish(self, Err(err)),
        }
    }
}
