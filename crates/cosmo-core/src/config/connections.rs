//! Connection definitions and the sources they are loaded from.
//!
//! Three mutually exclusive sources are tried in priority order, first one
//! present wins:
//! 1. `COSMOS_CONNECTIONS_FILE` - path to a JSON array of connection objects
//! 2. `COSMOS_CONNECTIONS` - the same JSON array inline
//! 3. `OCONNSTRING` (+ optional `COSMOS_DATABASE_ID`) - a single legacy
//!    connection registered under the id `"default"`

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;

pub const CONNECTIONS_FILE_ENV: &str = "COSMOS_CONNECTIONS_FILE";
pub const CONNECTIONS_ENV: &str = "COSMOS_CONNECTIONS";
pub const LEGACY_CONNECTION_STRING_ENV: &str = "OCONNSTRING";
pub const LEGACY_DATABASE_ID_ENV: &str = "COSMOS_DATABASE_ID";

/// Id given to the connection built from legacy variables.
pub const LEGACY_CONNECTION_ID: &str = "default";
/// Database used by the legacy connection when none is configured.
pub const LEGACY_DEFAULT_DATABASE: &str = "defaultdb";

/// One named backend account/database pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Short identifier callers pass as `connection_id`.
    pub id: String,

    /// Secret material (`AccountEndpoint=...;AccountKey=...;`).
    /// Never serialized back out.
    #[serde(skip_serializing, default)]
    pub connection_string: String,

    /// Database inside the account.
    pub database_id: String,

    /// Per-connection write policy. `None` defers to the global default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_modifications: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        id: impl Into<String>,
        connection_string: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            connection_string: connection_string.into(),
            database_id: database_id.into(),
            allow_modifications: None,
            description: None,
        }
    }

    pub fn with_allow_modifications(mut self, allow: bool) -> Self {
        self.allow_modifications = Some(allow);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// The connection string carries an account key; keep it out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("id", &self.id)
            .field("connection_string", &"<redacted>")
            .field("database_id", &self.database_id)
            .field("allow_modifications", &self.allow_modifications)
            .field("description", &self.description)
            .finish()
    }
}

/// Which source produced the connection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File(PathBuf),
    Inline,
    Legacy,
    None,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::File(path) => write!(f, "file {}", path.display()),
            SourceKind::Inline => write!(f, "{}", CONNECTIONS_ENV),
            SourceKind::Legacy => write!(f, "{}", LEGACY_CONNECTION_STRING_ENV),
            SourceKind::None => write!(f, "none"),
        }
    }
}

/// Connection definitions loaded from one source.
#[derive(Debug, Clone)]
pub struct LoadedConnections {
    pub source: SourceKind,
    pub connections: Vec<ConnectionConfig>,
}

/// Reads connection definitions from environment-style variables.
pub struct ConfigSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    lookup: F,
}

impl ConfigSource<fn(&str) -> Option<String>> {
    /// Source backed by the process environment.
    pub fn from_env() -> Self {
        Self {
            lookup: env_lookup,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl<F> ConfigSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Source backed by an arbitrary lookup function.
    pub fn from_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    /// Empty values count as absent.
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Load the ordered connection list.
    pub fn load(&self) -> Result<LoadedConnections, ConfigError> {
        if let Some(path) = self.var(CONNECTIONS_FILE_ENV) {
            let path = PathBuf::from(path.trim());
            let content = fs::read_to_string(&path).map_err(|e| {
                ConfigError::Config(format!(
                    "cannot read connections file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let connections = parse_connections(&content).map_err(|e| {
                ConfigError::Config(format!(
                    "cannot parse connections file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            return Ok(LoadedConnections {
                source: SourceKind::File(path),
                connections,
            });
        }

        if let Some(inline) = self.var(CONNECTIONS_ENV) {
            let connections = parse_connections(&inline).map_err(|e| {
                ConfigError::Config(format!("cannot parse {}: {}", CONNECTIONS_ENV, e))
            })?;
            return Ok(LoadedConnections {
                source: SourceKind::Inline,
                connections,
            });
        }

        if let Some(connection_string) = self.var(LEGACY_CONNECTION_STRING_ENV) {
            let database_id = self
                .var(LEGACY_DATABASE_ID_ENV)
                .unwrap_or_else(|| LEGACY_DEFAULT_DATABASE.to_string());
            return Ok(LoadedConnections {
                source: SourceKind::Legacy,
                connections: vec![ConnectionConfig::new(
                    LEGACY_CONNECTION_ID,
                    connection_string,
                    database_id,
                )],
            });
        }

        Ok(LoadedConnections {
            source: SourceKind::None,
            connections: Vec::new(),
        })
    }
}

/// Parse a JSON array of connection objects.
pub fn parse_connections(content: &str) -> Result<Vec<ConnectionConfig>, ConfigError> {
    Ok(serde_json::from_str(content)?)
}
