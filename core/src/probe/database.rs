//! SQL database connectivity probing

use async_trait::async_trait;
use schema::{ConnectionConfig, ProbeResult, ProbeSubject};
use sqlx::{AnyConnection, Connection};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use super::{error_chain, finish, Probe, ProbeError};

/// Database engines with a known connection-string dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    MySql,
    Postgres,
}

impl Engine {
    /// Canonical engine name
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::Postgres => "postgres",
        }
    }

    /// Port used when none is configured
    pub fn default_port(&self) -> u16 {
        match self {
            Engine::MySql => 3306,
            Engine::Postgres => 5432,
        }
    }

    /// Build the driver URL for `config`
    ///
    /// The returned URL carries the password; it must only be handed to the
    /// driver and never formatted into logs or messages.
    pub fn dsn(&self, config: &ConnectionConfig) -> Result<Url, ProbeError> {
        let port: u16 = config
            .port()
            .trim()
            .parse()
            .map_err(|_| ProbeError::Dial(format!("invalid port \"{}\"", config.port())))?;
        let mut url = Url::parse(&format!("{}://{}:{}/", self.as_str(), config.host(), port))
            .map_err(|e| ProbeError::Dial(format!("invalid address {}: {e}", config.host())))?;

        let invalid = |_| ProbeError::Dial("credentials cannot be set on this address".to_string());
        if !config.user().is_empty() {
            url.set_username(config.user()).map_err(invalid)?;
        }
        if !config.password().is_empty() {
            url.set_password(Some(config.password().expose()))
                .map_err(invalid)?;
        }
        url.set_path(&format!("/{}", config.database()));
        if let Engine::Postgres = self {
            url.query_pairs_mut().append_pair("sslmode", "disable");
        }
        Ok(url)
    }

    /// Quote `table` as an identifier in this dialect
    ///
    /// A `schema.table` form quotes each part separately. Embedded quote
    /// characters are doubled. Postgres parts are lower-cased first, the way
    /// the server folds unquoted names, so `Users` still finds `users`.
    pub fn quote_identifier(&self, table: &str) -> Result<String, ProbeError> {
        let table = table.trim();
        if table.is_empty() {
            return Err(ProbeError::Query("table name cannot be empty".to_string()));
        }
        let quote = match self {
            Engine::MySql => '`',
            Engine::Postgres => '"',
        };
        let mut parts = Vec::new();
        for part in table.split('.') {
            if part.is_empty() {
                return Err(ProbeError::Query(format!("invalid table name \"{table}\"")));
            }
            let part = match self {
                Engine::MySql => part.to_string(),
                Engine::Postgres => part.to_lowercase(),
            };
            let escaped = part.replace(quote, &format!("{quote}{quote}"));
            parts.push(format!("{quote}{escaped}{quote}"));
        }
        Ok(parts.join("."))
    }
}

impl FromStr for Engine {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            other => Err(ProbeError::Unsupported(format!("database engine '{other}'"))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database probe: open, ping, then fetch the server version
///
/// The connection is opened and closed within a single call, so nothing is
/// shared between probes.
#[derive(Debug, Clone)]
pub struct DatabaseProbe {
    config: ConnectionConfig,
}

impl DatabaseProbe {
    /// Create a probe; `config.engine()` selects the dialect
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Get the connection parameters
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn engine(&self) -> Result<Engine, ProbeError> {
        self.config.engine().parse()
    }

    fn tag(&self) -> String {
        self.config.engine().to_uppercase()
    }

    /// Run `SELECT COUNT(*)` against `table` and report the row count
    ///
    /// Never fails; errors are folded into the returned result.
    pub async fn count(&self, table: &str) -> ProbeResult {
        let outcome = self.count_rows(table).await;
        finish(self, outcome)
    }

    async fn count_rows(&self, table: &str) -> Result<String, ProbeError> {
        let engine = self.engine()?;
        let quoted = engine.quote_identifier(table)?;
        let request = format!("SELECT COUNT(*) AS COUNT FROM {quoted}");
        info!("[{}] REQUEST: {}", self.tag(), request);

        let mut conn = self.open(engine).await?;
        let outcome = self
            .bounded(sqlx::query_scalar::<_, i64>(&request).fetch_one(&mut conn))
            .await;
        self.close(conn).await;

        let count = outcome?;
        let message = format!("{count} row(s) found in table {}", table.trim().to_uppercase());
        info!("[{}] MSG: {}", self.tag(), message);
        Ok(message)
    }

    async fn open(&self, engine: Engine) -> Result<AnyConnection, ProbeError> {
        sqlx::any::install_default_drivers();
        let dsn = engine.dsn(&self.config)?;
        debug!("[{}] connecting to {}", self.tag(), self.config);

        let mut conn = match timeout(self.config.timeout(), AnyConnection::connect(dsn.as_str())).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(ProbeError::Dial(format!("open: {}", error_chain(&e)))),
            Err(_elapsed) => return Err(ProbeError::Timeout(self.config.timeout())),
        };

        let pinged = timeout(self.config.timeout(), conn.ping()).await;
        match pinged {
            Ok(Ok(())) => Ok(conn),
            Ok(Err(e)) => {
                self.close(conn).await;
                Err(ProbeError::Dial(format!("ping: {}", error_chain(&e))))
            }
            // dropping the handle closes the socket without another round trip
            Err(_elapsed) => Err(ProbeError::Timeout(self.config.timeout())),
        }
    }

    /// Bound a query by the configured timeout, mapping driver errors to `Query`
    async fn bounded<T, F>(&self, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match timeout(self.config.timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ProbeError::Query(error_chain(&e))),
            Err(_elapsed) => Err(ProbeError::Timeout(self.config.timeout())),
        }
    }

    async fn close(&self, conn: AnyConnection) {
        if let Err(e) = conn.close().await {
            warn!("[{}] close: {}", self.tag(), e);
        }
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    fn subject(&self) -> ProbeSubject {
        ProbeSubject::Connection(self.config.clone())
    }

    fn secrets(&self) -> Vec<&str> {
        vec![self.config.password().expose()]
    }

    async fn check(&self) -> Result<String, ProbeError> {
        let engine = self.engine()?;
        let mut conn = self.open(engine).await?;
        let outcome = self
            .bounded(sqlx::query_scalar::<_, String>("SELECT VERSION()").fetch_one(&mut conn))
            .await;
        self.close(conn).await;

        let version = outcome?;
        Ok(format!("Database connection OK (version: {version})"))
    }

    fn failure_message(&self, err: &ProbeError) -> String {
        format!("[{}] {} : {}", self.tag(), self.config, err)
    }
}
