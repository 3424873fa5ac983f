//! Subcommand implementations and the startup wiring they share.

pub mod connections;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use cosmo_adapter_rest::RestConnector;
use cosmo_core::config::global_allow_modifications;
use cosmo_core::{ConfigSource, CosmoConfig, DriverOptions, LoadedConnections};
use cosmo_policy::ModificationGuard;
use cosmo_runtime::ConnectionRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Load `cosmo.yaml`, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<CosmoConfig> {
    if path.exists() {
        CosmoConfig::from_file(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))
    } else {
        warn!(path = ?path, "Config file not found, using defaults");
        Ok(CosmoConfig::default())
    }
}

/// Read connection definitions from the environment.
pub fn load_connections() -> Result<LoadedConnections> {
    let loaded = ConfigSource::from_env()
        .load()
        .context("Failed to load connection definitions")?;

    if loaded.connections.is_empty() {
        warn!("No connections configured; set COSMOS_CONNECTIONS_FILE, COSMOS_CONNECTIONS or OCONNSTRING");
    } else {
        info!(
            source = %loaded.source,
            count = loaded.connections.len(),
            "Loaded connection definitions"
        );
    }
    Ok(loaded)
}

/// Registry backed by the REST gateway, with every loaded connection
/// registered in order. Entries that fail validation are logged and skipped
/// so the remaining connections stay usable.
pub fn build_registry(loaded: LoadedConnections) -> Arc<ConnectionRegistry> {
    let connector = RestConnector::new(DriverOptions::from_env());
    let registry = Arc::new(ConnectionRegistry::new(Arc::new(connector)));
    register_all(&registry, loaded);
    registry
}

fn register_all(registry: &ConnectionRegistry, loaded: LoadedConnections) {
    for connection in loaded.connections {
        let id = connection.id.clone();
        if let Err(e) = registry.register(connection) {
            warn!(connection_id = %id, error = %e, "Skipping invalid connection");
        }
    }
}

/// Write guard using the process-wide `COSMOS_ALLOW_MODIFICATIONS` default.
pub fn build_guard(registry: &Arc<ConnectionRegistry>) -> ModificationGuard {
    let global = global_allow_modifications(|k| std::env::var(k).ok());
    ModificationGuard::new(registry.clone(), global)
}
