//! Result cache keyed by agent kind and canonical input.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::agent::AgentKind;
use crate::task::AgentOutput;

/// Caches successful agent outputs so repeated identical work short-circuits.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, AgentOutput>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key derived from the kind and the canonical JSON encoding of the
    /// input payload.
    pub fn key(kind: &AgentKind, input: &serde_json::Value) -> String {
        format!("{}::{}", kind, input)
    }

    pub fn get(&self, kind: &AgentKind, input: &serde_json::Value) -> Option<AgentOutput> {
        self.entries.read().get(&Self::key(kind, input)).cloned()
    }

    pub fn insert(&self, kind: &AgentKind, input: &serde_json::Value, output: AgentOutput) {
        self.entries
            .write()
            .insert(Self::key(kind, input), output);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
