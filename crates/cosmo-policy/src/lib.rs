//! Cosmo write policy.
//!
//! Every mutating tool asks the [`ModificationGuard`] before touching the
//! backend. The guard fails closed: a connection may write only if its own
//! `allowModifications` is `true`, or it sets nothing and the process-wide
//! default is `true`.

use cosmo_core::{CosmoError, CosmoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mutating operations subject to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
    Upsert,
}

impl WriteOperation {
    pub const ALL: [WriteOperation; 4] = [
        WriteOperation::Create,
        WriteOperation::Update,
        WriteOperation::Delete,
        WriteOperation::Upsert,
    ];

    /// Name of the tool that performs this operation.
    pub fn tool_name(&self) -> &'static str {
        match self {
            WriteOperation::Create => "mcp_create_document",
            WriteOperation::Update => "mcp_update_document",
            WriteOperation::Delete => "mcp_delete_document",
            WriteOperation::Upsert => "mcp_upsert_document",
        }
    }
}

impl fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// What the guard needs to know about connections.
pub trait ConnectionPolicyLookup: Send + Sync {
    /// Resolve an optional id to a registered connection id (default when
    /// `None`).
    fn resolve_id(&self, id: Option<&str>) -> CosmoResult<String>;

    /// The connection's own `allowModifications` setting.
    fn allow_modifications(&self, id: &str) -> CosmoResult<Option<bool>>;
}

/// Per-connection write gate.
#[derive(Clone)]
pub struct ModificationGuard {
    lookup: Arc<dyn ConnectionPolicyLookup>,
    global_default: bool,
}

impl ModificationGuard {
    pub fn new(lookup: Arc<dyn ConnectionPolicyLookup>, global_default: bool) -> Self {
        Self {
            lookup,
            global_default,
        }
    }

    pub fn global_default(&self) -> bool {
        self.global_default
    }

    /// Effective policy for one connection config value.
    pub fn effective(&self, explicit: Option<bool>) -> bool {
        explicit.unwrap_or(self.global_default)
    }

    /// Whether writes are allowed on the resolved connection.
    pub fn is_allowed(&self, id: Option<&str>) -> CosmoResult<bool> {
        let resolved = self.lookup.resolve_id(id)?;
        let explicit = self.lookup.allow_modifications(&resolved)?;
        Ok(self.effective(explicit))
    }

    /// Fail with `ModificationsDisabled` unless writes are allowed.
    /// Returns the resolved connection id.
    pub fn validate(&self, operation: WriteOperation, id: Option<&str>) -> CosmoResult<String> {
        let resolved = self.lookup.resolve_id(id)?;
        let explicit = self.lookup.allow_modifications(&resolved)?;
        if self.effective(explicit) {
            debug!(connection_id = %resolved, operation = %operation, "Modification allowed");
            Ok(resolved)
        } else {
            warn!(connection_id = %resolved, operation = %operation, "Modification blocked");
            Err(CosmoError::ModificationsDisabled {
                connection_id: resolved,
                operation: operation.tool_name().to_string(),
            })
        }
    }
}
