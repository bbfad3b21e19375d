//! Probe targets, outcomes and reports

use crate::Secret;
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// Transport used when a socket target does not name one
pub const DEFAULT_PROTOCOL: &str = "tcp";

/// Classification of a probe failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The probe succeeded
    #[default]
    None,
    /// Name or address resolution failed
    Resolve,
    /// Transport-level connect failure
    Dial,
    /// A bounded operation exceeded its deadline
    Timeout,
    /// The remote end rejected the supplied credentials
    Auth,
    /// A protocol operation failed after the connection was established
    Query,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Short machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::None => "none",
            ErrorKind::Resolve => "resolve",
            ErrorKind::Dial => "dial",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::Query => "query",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate address for a socket reachability attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTarget {
    /// IPv4 literal (or host name) to dial
    pub address: String,
    /// Port as supplied by the caller
    pub port: String,
    /// Transport protocol name (`tcp`, `udp`, ...)
    pub protocol: String,
}

impl ProbeTarget {
    /// Create a target; an empty protocol falls back to [`DEFAULT_PROTOCOL`]
    pub fn new(
        address: impl Into<String>,
        port: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        let protocol = protocol.into();
        Self {
            address: address.into(),
            port: port.into(),
            protocol: if protocol.trim().is_empty() {
                DEFAULT_PROTOCOL.to_string()
            } else {
                protocol.trim().to_lowercase()
            },
        }
    }

    /// `address:port` form suitable for dialing
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}/{}", self.address, self.port, self.protocol)
    }
}

/// Parameters for a database or directory probe
///
/// Built fresh for every attempt and never changed afterwards. The password
/// is held as a [`Secret`], so neither `Debug`, `Display` nor serialization
/// can leak it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    engine: String,
    host: String,
    port: String,
    user: String,
    password: Secret,
    #[serde(default)]
    database: String,
    timeout: Duration,
    #[serde(default)]
    insecure: bool,
}

impl ConnectionConfig {
    /// Start a config for `engine` (e.g. `mysql`, `postgres`, `ldaps`)
    pub fn new(engine: impl Into<String>, host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            host: host.into(),
            port: port.into(),
            user: String::new(),
            password: Secret::default(),
            database: String::new(),
            timeout: Duration::from_secs(5),
            insecure: false,
        }
    }

    /// Attach the credentials to pass through
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<Secret>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Name of the database to open
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Deadline for each blocking step
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip TLS certificate verification
    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.engine)?;
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        write!(f, "{}:{}", self.host, self.port)?;
        if !self.database.is_empty() {
            write!(f, "/{}", self.database)?;
        }
        Ok(())
    }
}

/// What a probe was pointed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ProbeSubject {
    /// A single resolved socket address
    Socket(ProbeTarget),
    /// A database or directory endpoint
    Connection(ConnectionConfig),
    /// An HTTP URL
    Url(String),
}

impl fmt::Display for ProbeSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeSubject::Socket(target) => target.fmt(f),
            ProbeSubject::Connection(config) => config.fmt(f),
            ProbeSubject::Url(url) => f.write_str(url),
        }
    }
}

impl From<ProbeTarget> for ProbeSubject {
    fn from(target: ProbeTarget) -> Self {
        ProbeSubject::Socket(target)
    }
}

impl From<ConnectionConfig> for ProbeSubject {
    fn from(config: ConnectionConfig) -> Self {
        ProbeSubject::Connection(config)
    }
}

/// Outcome of exactly one probe attempt
///
/// Fields are read-only after construction. The constructors guarantee a
/// non-empty message and that a failure never carries [`ErrorKind::None`].
/// Deserialization goes through the same checks, see [`ProbeResultRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    target: ProbeSubject,
    success: bool,
    message: String,
    error_kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default)]
    challenge: bool,
}

impl ProbeResult {
    /// A successful attempt
    pub fn ok(target: impl Into<ProbeSubject>, message: impl Into<String>) -> Self {
        let target = target.into();
        let message = non_empty(message.into(), || format!("{target} is OK"));
        Self {
            target,
            success: true,
            message,
            error_kind: ErrorKind::None,
            status: None,
            challenge: false,
        }
    }

    /// A successful attempt that observed an upstream HTTP status
    pub fn responded(target: impl Into<ProbeSubject>, status: u16, message: impl Into<String>) -> Self {
        let mut result = Self::ok(target, message);
        result.status = Some(status);
        result
    }

    /// A failed attempt. `ErrorKind::None` is coerced to `Unknown`.
    pub fn failed(
        target: impl Into<ProbeSubject>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let target = target.into();
        let error_kind = if kind == ErrorKind::None {
            ErrorKind::Unknown
        } else {
            kind
        };
        let message = non_empty(message.into(), || format!("{target} failed ({error_kind})"));
        Self {
            target,
            success: false,
            message,
            error_kind,
            status: None,
            challenge: false,
        }
    }

    /// Mark a failed attempt as needing fresh credentials from the caller
    #[must_use]
    pub fn with_challenge(mut self) -> Self {
        self.challenge = !self.success;
        self
    }

    pub fn target(&self) -> &ProbeSubject {
        &self.target
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    /// Upstream HTTP status, for web probes that got a response
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the caller should re-prompt for credentials
    pub fn challenge(&self) -> bool {
        self.challenge
    }
}

/// Wire form of a [`ProbeResult`] before its invariants are checked
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResultRecord {
    target: ProbeSubject,
    success: bool,
    message: String,
    error_kind: ErrorKind,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    challenge: bool,
}

impl TryFrom<ProbeResultRecord> for ProbeResult {
    type Error = String;

    fn try_from(record: ProbeResultRecord) -> Result<Self, Self::Error> {
        if record.message.trim().is_empty() {
            return Err("probe result message cannot be empty".to_string());
        }
        match (record.success, record.error_kind) {
            (true, ErrorKind::None) => {
                if record.challenge {
                    return Err("a successful result cannot request a challenge".to_string());
                }
            }
            (true, kind) => return Err(format!("a successful result cannot carry error kind {kind}")),
            (false, ErrorKind::None) => return Err("a failed result needs an error kind".to_string()),
            (false, _) => {
                if record.status.is_some() {
                    return Err("a failed result cannot carry an upstream status".to_string());
                }
            }
        }
        Ok(Self {
            target: record.target,
            success: record.success,
            message: record.message,
            error_kind: record.error_kind,
            status: record.status,
            challenge: record.challenge,
        })
    }
}

impl<'de> Deserialize<'de> for ProbeResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = ProbeResultRecord::deserialize(deserializer)?;
        Self::try_from(record).map_err(de::Error::custom)
    }
}

fn non_empty(message: String, fallback: impl FnOnce() -> String) -> String {
    if message.trim().is_empty() {
        fallback()
    } else {
        message
    }
}

/// Ordered outcomes of a multi-target run
///
/// Entries keep the order in which targets were handed to the runner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    results: Vec<ProbeResult>,
}

impl ProbeReport {
    /// An empty report without a heading
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty report with a heading line
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            results: Vec::new(),
        }
    }

    /// A report holding a single outcome
    pub fn single(result: ProbeResult) -> Self {
        Self {
            title: None,
            results: vec![result],
        }
    }

    /// Append the next outcome
    pub fn push(&mut self, result: ProbeResult) {
        self.results.push(result);
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True when every entry succeeded (and there is at least one)
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(ProbeResult::success)
    }

    /// First failed entry, if any
    pub fn first_failure(&self) -> Option<&ProbeResult> {
        self.results.iter().find(|r| !r.success())
    }
}

impl Extend<ProbeResult> for ProbeReport {
    fn extend<I: IntoIterator<Item = ProbeResult>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}

impl FromIterator<ProbeResult> for ProbeReport {
    fn from_iter<I: IntoIterator<Item = ProbeResult>>(iter: I) -> Self {
        Self {
            title: None,
            results: iter.into_iter().collect(),
        }
    }
}
