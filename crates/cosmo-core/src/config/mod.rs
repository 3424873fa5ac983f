//! Configuration types for the Cosmo proxy.
//!
//! Connection definitions come from the environment (see [`connections`]).
//! Server settings come from an optional `cosmo.yaml`:
//!
//! ```yaml
//! mcp:
//!   transport: http
//!   port: 3000
//! connect_on_startup: true
//! sampling:
//!   stats_sample_size: 1000
//!   schema_sample_size: 100
//!   default_max_items: 100
//! ```

pub mod connections;
pub mod driver;
pub mod mcp;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use connections::{ConfigSource, ConnectionConfig, LoadedConnections, SourceKind};
pub use driver::DriverOptions;
pub use mcp::{McpConfig, Transport};

/// Process-wide write policy, used when a connection sets none.
pub const ALLOW_MODIFICATIONS_ENV: &str = "COSMOS_ALLOW_MODIFICATIONS";

/// Server settings loaded from `cosmo.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmoConfig {
    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Connect every registered connection before serving.
    #[serde(default = "default_true")]
    pub connect_on_startup: bool,

    /// Sample sizes used by analysis tools.
    #[serde(default)]
    pub sampling: SamplingConfig,
}

impl Default for CosmoConfig {
    fn default() -> Self {
        Self {
            mcp: McpConfig::default(),
            connect_on_startup: true,
            sampling: SamplingConfig::default(),
        }
    }
}

/// Default sizes for sampling-based tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_stats_sample_size")]
    pub stats_sample_size: usize,

    #[serde(default = "default_schema_sample_size")]
    pub schema_sample_size: usize,

    /// Page size for raw queries when the caller gives none.
    #[serde(default = "default_max_items")]
    pub default_max_items: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stats_sample_size: default_stats_sample_size(),
            schema_sample_size: default_schema_sample_size(),
            default_max_items: default_max_items(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stats_sample_size() -> usize {
    1000
}

fn default_schema_sample_size() -> usize {
    100
}

fn default_max_items() -> usize {
    100
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),
}

impl CosmoConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }
}

/// Parse a boolean flag. `true`, `yes`, `1` and `on` are true
/// (case-insensitive); anything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// Read a boolean variable through `lookup`, falling back to `default` when
/// it is absent or empty.
pub fn lookup_bool<F>(lookup: F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => parse_bool(&v),
        _ => default,
    }
}

/// The global write default from `COSMOS_ALLOW_MODIFICATIONS` (false when unset).
pub fn global_allow_modifications<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup_bool(lookup, ALLOW_MODIFICATIONS_ENV, false)
}
