// Configuration types shared across all Cosmo crates
pub mod config;

// Tagged document values used by analysis
pub mod document;

pub mod error;

pub use config::{
    ConfigError, ConfigSource, ConnectionConfig, CosmoConfig, DriverOptions, LoadedConnections,
    McpConfig, SamplingConfig, SourceKind, Transport,
};
pub use document::{DocValue, TypeTag};
pub use error::{BackendError, CosmoError, CosmoResult};
