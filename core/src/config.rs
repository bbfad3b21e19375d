//! Probe settings read from the process environment
//!
//! Settings are loaded at every probe invocation, so changes to the
//! environment apply to the next request and nothing is cached between
//! requests. Loading goes through an [`EnvLookup`] so tests can supply their
//! own variables without touching the real environment.

use crate::probe::database::Engine;
use crate::{CoreError, Result};
use schema::{ConnectionConfig, Secret};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Source of configuration variables
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by `std::env::var`
pub fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok())
}

/// Default per-attempt timeout for socket and web probes
pub const DEFAULT_NETWORK_TIMEOUT: &str = "5s";
/// Default database connect timeout, in seconds
pub const DEFAULT_DB_TIMEOUT: &str = "5";
/// Default URL for the web probe
pub const DEFAULT_TEST_URL: &str = "https://www.ecosia.org/";
/// Default directory endpoint
pub const DEFAULT_LDAP_URL: &str = "ldaps://localhost:636";

/// Database connection defaults
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub user: String,
    pub password: Secret,
    pub host: String,
    /// Explicit port; the engine default applies when unset
    pub port: Option<String>,
    pub name: String,
    pub timeout: Duration,
}

/// Directory (LDAP) endpoint settings
#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub url: String,
    /// Bind-DN template or base DN
    pub bind_dn: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
}

/// Everything a probe invocation needs from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub directory: DirectorySettings,
    pub network_timeout: Duration,
    pub network_concurrency: usize,
    pub test_url: String,
}

impl Settings {
    /// Load from the real process environment
    pub fn from_env() -> Result<Self> {
        Self::load(&process_env())
    }

    /// Load through the given lookup
    pub fn load(lookup: &EnvLookup) -> Result<Self> {
        Self::from_lookup(|key| lookup(key))
    }

    /// Load from any key -> value function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let database = DatabaseSettings {
            user: get_or("DB_USER", ""),
            password: Secret::new(lookup("DB_PASSWORD").unwrap_or_default()),
            host: get_or("DB_HOST", "localhost"),
            port: get("DB_PORT"),
            name: get_or("DB_NAME", ""),
            timeout: parse_timeout("DB_TIMEOUT", &get_or("DB_TIMEOUT", DEFAULT_DB_TIMEOUT))?,
        };

        let directory = DirectorySettings {
            url: get_or("LDAP_URL", DEFAULT_LDAP_URL),
            bind_dn: get_or("LDAP_BIND_DN", ""),
            insecure: parse_flag("LDAP_INSECURE", get("LDAP_INSECURE").as_deref())?,
        };

        let network_timeout = parse_timeout(
            "NETWORK_TIMEOUT",
            &get_or("NETWORK_TIMEOUT", DEFAULT_NETWORK_TIMEOUT),
        )?;

        let network_concurrency = match get("NETWORK_CONCURRENCY") {
            None => 1,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(CoreError::ConfigurationError(format!(
                        "NETWORK_CONCURRENCY: expected a positive integer, got '{raw}'"
                    )))
                }
            },
        };

        Ok(Self {
            database,
            directory,
            network_timeout,
            network_concurrency,
            test_url: get_or("TEST_URL", DEFAULT_TEST_URL),
        })
    }

    /// Connection parameters for a database probe against `engine`
    pub fn database_config(&self, engine: Engine) -> ConnectionConfig {
        let db = &self.database;
        let port = db
            .port
            .clone()
            .unwrap_or_else(|| engine.default_port().to_string());
        ConnectionConfig::new(engine.as_str(), db.host.clone(), port)
            .with_credentials(db.user.clone(), db.password.clone())
            .with_database(db.name.clone())
            .with_timeout(db.timeout)
    }

    /// Connection parameters for a directory bind as `user`
    pub fn directory_config(&self, user: &str, password: Secret) -> Result<ConnectionConfig> {
        let dir = &self.directory;
        let url = Url::parse(&dir.url).map_err(|e| {
            CoreError::ConfigurationError(format!("LDAP_URL: invalid url '{}': {e}", dir.url))
        })?;
        let scheme = url.scheme().to_lowercase();
        let default_port = match scheme.as_str() {
            "ldaps" => 636,
            "ldap" => 389,
            other => {
                return Err(CoreError::ConfigurationError(format!(
                    "LDAP_URL: unsupported scheme '{other}'"
                )))
            }
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CoreError::ConfigurationError("LDAP_URL: missing host".to_string()))?;
        let port = url.port().unwrap_or(default_port);

        Ok(ConnectionConfig::new(scheme, host, port.to_string())
            .with_credentials(user, password)
            .with_timeout(self.network_timeout)
            .with_insecure(dir.insecure))
    }
}

/// Parse a timeout given either as bare seconds (`5`) or a humantime
/// duration (`5s`, `250ms`, `1m 30s`).
pub fn parse_timeout(name: &str, raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let parsed = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(raw).map_err(|e| {
            CoreError::ConfigurationError(format!("{name}: invalid duration '{raw}': {e}"))
        })?,
    };
    if parsed.is_zero() {
        return Err(CoreError::ConfigurationError(format!(
            "{name}: timeout must be greater than zero"
        )));
    }
    Ok(parsed)
}

fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool> {
    match raw.map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(CoreError::ConfigurationError(format!(
                "{name}: expected a boolean, got '{v}'"
            ))),
        },
    }
}
