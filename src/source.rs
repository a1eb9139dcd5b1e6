//! Statistics source: the store collaborator.
//!
//! The sampling loop only ever sees the [`StatsSource`] trait — two
//! synchronous fetches returning raw statistics text. [`RedisSource`] is a
//! thin adapter over the `redis` client crate; the core never extends a
//! library type.

use std::time::Duration;

use tracing::{debug, info};

/// Connect timeout for the initial TCP handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read/write timeout on the established connection. The statistics fetch
/// has no cancellation point, so a bounded socket timeout is what turns a
/// hung server into a fatal error instead of an indefinite block.
const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for store access failures.
#[derive(Debug)]
pub enum SourceError {
    /// Could not establish or authenticate the connection.
    Connection(String),
    /// A statistics fetch failed mid-run.
    Query(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Connection(msg) => write!(f, "redis connection: {}", msg),
            SourceError::Query(msg) => write!(f, "redis query: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Raw server-statistics feed, polled once per cycle in fixed order:
/// general info first, command stats second.
pub trait StatsSource {
    fn fetch_info(&mut self) -> Result<String, SourceError>;
    fn fetch_commandstats(&mut self) -> Result<String, SourceError>;
}

/// Live Redis connection.
pub struct RedisSource {
    con: redis::Connection,
}

impl RedisSource {
    /// Connects, optionally authenticates, and verifies the server with a
    /// PING. Any failure here is a startup error for the caller.
    pub fn connect(host: &str, port: u16, password: Option<&str>) -> Result<Self, SourceError> {
        let client = redis::Client::open(format!("redis://{}:{}/", host, port))
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        let mut con = client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        con.set_read_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        con.set_write_timeout(Some(IO_TIMEOUT))
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        if let Some(password) = password {
            redis::cmd("AUTH")
                .arg(password)
                .query::<()>(&mut con)
                .map_err(|e| SourceError::Connection(format!("authentication failed: {}", e)))?;
        }

        redis::cmd("PING")
            .query::<String>(&mut con)
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        info!("connected to redis at {}:{}", host, port);
        Ok(Self { con })
    }

    fn info_section(&mut self, section: Option<&str>) -> Result<String, SourceError> {
        let mut cmd = redis::cmd("INFO");
        if let Some(section) = section {
            cmd.arg(section);
        }
        let text: String = cmd
            .query(&mut self.con)
            .map_err(|e| SourceError::Query(e.to_string()))?;
        debug!(
            "INFO {} returned {} bytes",
            section.unwrap_or("(default)"),
            text.len()
        );
        Ok(text)
    }
}

impl StatsSource for RedisSource {
    fn fetch_info(&mut self) -> Result<String, SourceError> {
        self.info_section(None)
    }

    fn fetch_commandstats(&mut self) -> Result<String, SourceError> {
        self.info_section(Some("commandstats"))
    }
}
