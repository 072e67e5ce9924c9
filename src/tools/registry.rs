use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{OsintError, Result};
use crate::tools::definition::ToolDefinition;
use crate::tools::tool::Tool;

/// Name → tool lookup shared by the dispatcher and the connector manager.
///
/// Registration may happen at any time (connector discovery registers tools
/// at runtime); readers always see a consistent map.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins; an overwrite is logged, not rejected. Connector
    /// discovery goes through [`Self::register_discovered`] instead.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(OsintError::invalid_input("tool name must not be empty"));
        }
        let previous = self.tools.write().insert(name.clone(), tool);
        if previous.is_some() {
            warn!(tool = %name, "tool re-registered, previous entry overwritten");
        } else {
            debug!(tool = %name, "tool registered");
        }
        Ok(())
    }

    /// Registers a tool synthesized from a remote document. Returns `false`,
    /// leaving the registry untouched, when the name belongs to a native tool.
    pub fn register_discovered(&self, tool: Arc<dyn Tool>) -> Result<bool> {
        let name = tool.name().trim().to_string();
        if name.is_empty() {
            return Err(OsintError::invalid_input("tool name must not be empty"));
        }
        let mut tools = self.tools.write();
        match tools.get(&name) {
            Some(existing) if !existing.is_discovered() => {
                warn!(tool = %name, "discovered operation collides with a native tool, skipped");
                Ok(false)
            }
            Some(_) => {
                debug!(tool = %name, "discovered tool replaced");
                tools.insert(name, tool);
                Ok(true)
            }
            None => {
                debug!(tool = %name, "discovered tool registered");
                tools.insert(name, tool);
                Ok(true)
            }
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.tools.write().remove(name).is_some();
        if removed {
            debug!(tool = name, "tool unregistered");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        // snapshot first so `definition()` never runs under the lock
        let tools: Vec<Arc<dyn Tool>> = self.tools.read().values().map(Arc::clone).collect();
        tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
