//! Typed tool registry.
//!
//! Dispatch is keyed by name against a closed handler signature: every
//! handler takes JSON arguments and the read-only execution context, and
//! returns a result plus proposed diffs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::generator::ToolSpec;
use serde_json::Value;

use crate::executor::{ToolContext, ToolError, ToolOutput};

/// A named tool the generator can invoke.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The tool's declaration, advertised to the generator.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool. Handlers read state through `ctx` and return
    /// proposed diffs; they never mutate state directly.
    async fn call(&self, args: &Value, ctx: &mut ToolContext<'_>)
    -> Result<ToolOutput, ToolError>;
}

/// Registry mapping tool name to handler.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its spec name, replacing any existing
    /// handler with the same name.
    pub fn register(&mut self, handler: impl ToolHandler + 'static) {
        let name = handler.spec().name;
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Looks up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// The declarations of all registered tools, sorted by name.
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.handlers.values().map(|h| h.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Registered tool names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
