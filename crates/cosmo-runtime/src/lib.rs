//! Cosmo runtime: backend capability traits and the connection registry.
//!
//! The in-memory backend in [`memory`] is built for tests only, under the
//! `test-util` feature.

pub mod adapter;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod registry;

pub use adapter::{
    BackendConnector, ContainerInfo, DatabaseInfo, DocumentBackend, PartitionKeyDefinition,
    QueryOptions, QueryPage, QueryParameter, QuerySpec, value_at_path,
};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryBackend, MemoryConnector};
pub use registry::{
    ActiveConnection, ConnectFailure, ConnectReport, ConnectionRegistry, ConnectionSummary,
};
