//! Opaque element handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an element owned by a backend.
///
/// The engine never inspects DOM state through the handle; it passes handles
/// back to the backend that produced them. `label` is a short human-readable
/// descriptor ("button#go") used only in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Backend-assigned node id
    pub id: u64,

    /// Human-readable descriptor for logging
    pub label: String,
}

impl ElementHandle {
    pub fn new(id: u64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.label, self.id)
    }
}
