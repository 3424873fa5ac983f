//! Approximate container statistics and schema summaries, computed from a
//! bounded sample plus (for statistics) one exact count.

pub mod schema;
pub mod stats;

pub use schema::{PropertyAnalysis, SchemaAnalysis, SchemaAnalyzer};
pub use stats::{ContainerStats, PartitionKeyStats, StatsSampler};
