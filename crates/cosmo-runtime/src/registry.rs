//! Connection registry.
//!
//! Maps connection ids to their configuration and, once established, to a
//! live backend handle. The first id ever registered is the default and
//! never changes.

use crate::adapter::{BackendConnector, DocumentBackend};
use cosmo_core::{ConnectionConfig, CosmoError, CosmoResult};
use cosmo_policy::{ConnectionPolicyLookup, ModificationGuard};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// A registered connection with a verified backend handle.
pub struct ActiveConnection {
    pub config: ConnectionConfig,
    pub backend: Arc<dyn DocumentBackend>,
}

impl ActiveConnection {
    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// Snapshot of one registered connection, as returned by list-connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub database_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Effective write policy.
    pub allow_modifications: bool,
    pub is_default: bool,
    pub connected: bool,
}

/// Outcome of [`ConnectionRegistry::connect_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectReport {
    pub connected: Vec<String>,
    pub failed: Vec<ConnectFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectFailure {
    pub id: String,
    pub error: String,
}

#[derive(Default)]
struct Registered {
    order: Vec<String>,
    configs: HashMap<String, ConnectionConfig>,
    default_id: Option<String>,
}

/// Owns every connection config and live handle.
pub struct ConnectionRegistry {
    connector: Arc<dyn BackendConnector>,
    registered: RwLock<Registered>,
    active: RwLock<HashMap<String, Arc<ActiveConnection>>>,
    /// Per-id guards serializing `connect` and `close`.
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            connector,
            registered: RwLock::new(Registered::default()),
            active: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Register (or re-register) a connection.
    ///
    /// Re-registering replaces the stored config but leaves an already active
    /// handle for the id untouched.
    pub fn register(&self, config: ConnectionConfig) -> CosmoResult<()> {
        if config.id.trim().is_empty() {
            return Err(CosmoError::validation("connection id must not be empty"));
        }
        if config.connection_string.trim().is_empty() {
            return Err(CosmoError::validation(format!(
                "connection '{}' has an empty connection string",
                config.id
            )));
        }
        if config.database_id.trim().is_empty() {
            return Err(CosmoError::validation(format!(
                "connection '{}' has an empty database id",
                config.id
            )));
        }

        let mut registered = self.registered.write().unwrap();
        let id = config.id.clone();
        if registered.configs.insert(id.clone(), config).is_none() {
            registered.order.push(id.clone());
        }
        if registered.default_id.is_none() {
            registered.default_id = Some(id.clone());
        }
        info!(connection_id = %id, "Registered connection");
        Ok(())
    }

    /// Registered ids, in first-registration order.
    pub fn registered_ids(&self) -> Vec<String> {
        self.registered.read().unwrap().order.clone()
    }

    /// Ids with a live handle, in registration order.
    pub fn active_ids(&self) -> Vec<String> {
        let active = self.active.read().unwrap();
        self.registered_ids()
            .into_iter()
            .filter(|id| active.contains_key(id))
            .collect()
    }

    pub fn default_id(&self) -> Option<String> {
        self.registered.read().unwrap().default_id.clone()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.read().unwrap().contains_key(id)
    }

    /// Stored config for a registered id.
    pub fn config(&self, id: &str) -> CosmoResult<ConnectionConfig> {
        let registered = self.registered.read().unwrap();
        registered
            .configs
            .get(id)
            .cloned()
            .ok_or_else(|| CosmoError::ConnectionNotFound {
                id: id.to_string(),
                known: registered.order.clone(),
            })
    }

    /// The given id, or the default when none is given.
    pub fn resolve(&self, id: Option<&str>) -> CosmoResult<String> {
        match id {
            Some(id) => Ok(id.to_string()),
            None => self.default_id().ok_or(CosmoError::NoDefault),
        }
    }

    /// Establish and verify a connection. No-op when already active.
    ///
    /// Concurrent calls for the same id are serialized: the second caller
    /// waits for the first and then finds the connection active.
    pub async fn connect(&self, id: &str) -> CosmoResult<()> {
        if self.is_active(id) {
            return Ok(());
        }
        // Fail fast on unknown ids before taking a guard.
        self.config(id)?;

        let guard = self.in_flight_guard(id);
        let _permit = guard.lock().await;

        if self.is_active(id) {
            debug!(connection_id = %id, "Connection became active while waiting");
            return Ok(());
        }

        let config = self.config(id)?;
        debug!(connection_id = %id, database_id = %config.database_id, "Connecting");
        let backend = self.connector.connect(&config).await?;
        if let Err(e) = backend.probe().await {
            backend.dispose().await;
            debug!(connection_id = %id, error = %e, "Connection probe failed");
            return Err(e.into());
        }

        self.active.write().unwrap().insert(
            id.to_string(),
            Arc::new(ActiveConnection { config, backend }),
        );
        info!(connection_id = %id, "Connected");
        Ok(())
    }

    /// Connect every registered id in registration order. Failures are
    /// logged and reported, never propagated.
    pub async fn connect_all(&self) -> ConnectReport {
        let mut report = ConnectReport::default();
        for id in self.registered_ids() {
            match self.connect(&id).await {
                Ok(()) => report.connected.push(id),
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Failed to connect");
                    report.failed.push(ConnectFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            connected = report.connected.len(),
            failed = report.failed.len(),
            "Connected registered connections"
        );
        report
    }

    /// The live handle for an id (or the default). Unknown ids are
    /// `ConnectionNotFound`; registered but inactive ids are `NotActive`.
    pub fn get(&self, id: Option<&str>) -> CosmoResult<Arc<ActiveConnection>> {
        let id = self.resolve(id)?;
        self.config(&id)?;
        if let Some(active) = self.active.read().unwrap().get(&id) {
            return Ok(active.clone());
        }
        Err(CosmoError::NotActive {
            id,
            active: self.active_ids(),
        })
    }

    /// Resolve, connect if needed, and return the live handle.
    pub async fn ensure_connected(&self, id: Option<&str>) -> CosmoResult<Arc<ActiveConnection>> {
        let id = self.resolve(id)?;
        self.connect(&id).await?;
        self.get(Some(&id))
    }

    /// Dispose and forget the live handle for an id. Idempotent.
    ///
    /// Waits for an in-flight `connect` of the same id, so a handle that
    /// connect is about to insert is closed too.
    pub async fn close(&self, id: &str) {
        let guard = self.in_flight_guard(id);
        let _permit = guard.lock().await;

        let removed = self.active.write().unwrap().remove(id);
        if let Some(active) = removed {
            active.backend.dispose().await;
            info!(connection_id = %id, "Closed connection");
        }
    }

    pub async fn close_all(&self) {
        for id in self.registered_ids() {
            self.close(&id).await;
        }
    }

    fn in_flight_guard(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        in_flight
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Snapshot of all registered connections.
    pub fn summaries(&self, guard: &ModificationGuard) -> Vec<ConnectionSummary> {
        let registered = self.registered.read().unwrap();
        let active = self.active.read().unwrap();
        registered
            .order
            .iter()
            .filter_map(|id| registered.configs.get(id))
            .map(|config| ConnectionSummary {
                id: config.id.clone(),
                database_id: config.database_id.clone(),
                description: config.description.clone(),
                allow_modifications: guard.effective(config.allow_modifications),
                is_default: registered.default_id.as_deref() == Some(config.id.as_str()),
                connected: active.contains_key(&config.id),
            })
            .collect()
    }
}

impl ConnectionPolicyLookup for ConnectionRegistry {
    fn resolve_id(&self, id: Option<&str>) -> CosmoResult<String> {
        let id = self.resolve(id)?;
        self.config(&id)?;
        Ok(id)
    }

    fn allow_modifications(&self, id: &str) -> CosmoResult<Option<bool>> {
        Ok(self.config(id)?.allow_modifications)
    }
}
