//! Agent capability boundary: kinds, the invoker trait, and the registry.
//!
//! The coordinator treats "running an agent" as an opaque async operation.
//! Kinds are open-ended strings resolved through a capability-keyed registry,
//! so new capabilities register at runtime without touching the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ConvoyError, Result};
use crate::task::AgentOutput;

/// Identifier for an agent capability, e.g. `"code-review"` or
/// `"security-audit"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentKind(String);

impl AgentKind {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentKind {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentKind {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The opaque "run an agent" operation.
///
/// Implementations report *expected* functional failures by returning an
/// [`AgentOutput`] with `success = false`, and return `Err` only for
/// unexpected infrastructure failures. The coordinator races every invocation
/// against a timeout; a timed-out future is dropped, which cancels it at its
/// next await point, but no cooperative cancellation is propagated to work
/// already handed to an external process.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, kind: &AgentKind, input: &serde_json::Value) -> Result<AgentOutput>;
}

/// Capability-keyed registry mapping an agent kind to its invoker.
#[derive(Default)]
pub struct AgentRegistry {
    handlers: RwLock<HashMap<AgentKind, Arc<dyn AgentInvoker>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a kind. Re-registering an existing kind is a
    /// caller error.
    pub fn register(
        &self,
        kind: impl Into<AgentKind>,
        handler: Arc<dyn AgentInvoker>,
    ) -> Result<()> {
        let kind = kind.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&kind) {
            return Err(ConvoyError::Validation(format!(
                "agent kind already registered: {}",
                kind
            )));
        }
        handlers.insert(kind, handler);
        Ok(())
    }

    pub fn resolve(&self, kind: &AgentKind) -> Result<Arc<dyn AgentInvoker>> {
        self.handlers
            .read()
            .get(kind)
            .cloned()
            .ok_or_else(|| ConvoyError::UnknownAgentKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &AgentKind) -> bool {
        self.handlers.read().contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        let mut kinds: Vec<AgentKind> = self.handlers.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(
            &self,
            kind: &AgentKind,
            input: &serde_json::Value,
        ) -> Result<AgentOutput> {
            Ok(AgentOutput::success(kind.clone(), input.clone()))
        }
    }

    #[test]
    fn register_and_resolve() {
        let registry = AgentRegistry::new();
        registry
            .register("echo", Arc::new(EchoInvoker))
            .unwrap();

        assert!(registry.contains(&AgentKind::from("echo")));
        assert!(registry.resolve(&AgentKind::from("echo")).is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = AgentRegistry::new();
        registry.register("echo", Arc::new(EchoInvoker)).unwrap();
        assert!(registry.register("echo", Arc::new(EchoInvoker)).is_err());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.resolve(&AgentKind::from("ghost")),
            Err(ConvoyError::UnknownAgentKind(_))
        ));
    }

    #[tokio::test]
    async fn invoker_round_trip() {
        let registry = AgentRegistry::new();
        registry.register("echo", Arc::new(EchoInvoker)).unwrap();

        let handler = registry.resolve(&AgentKind::from("echo")).unwrap();
        let output = handler
            .invoke(&AgentKind::from("echo"), &json!({"q": 1}))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.result, json!({"q": 1}));
    }
}
