//! Tool registry for MCP tools.
//!
//! Keeps definitions in registration order so `tools/list` and the
//! unknown-tool message are stable.

use crate::protocol::ToolDefinition;
use std::collections::HashMap;

/// Registry of available MCP tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name replaces the definition in place.
    pub fn register(&mut self, tool: ToolDefinition) {
        if !self.tools.contains_key(&tool.name) {
            self.order.push(tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tools in registration order.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.order.iter().filter_map(|n| self.tools.get(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }
}
