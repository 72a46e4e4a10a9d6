//! Bridge configuration.
//!
//! Sessions configure their script environment at startup. The defaults
//! match what card scripts are written against.

use serde::{Deserialize, Serialize};

/// Script environment configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum nested invocations across the native/script boundary.
    /// Entering invocation `max_call_depth + 1` fails.
    pub max_call_depth: usize,

    /// Capacity in bytes of the diagnostic message buffer.
    pub message_capacity: usize,

    /// Maximum code distance at which a card shares its alias's script.
    pub alias_window: u32,

    /// Scripts loaded through the reader when the environment starts,
    /// in order (shared constants and utility functions).
    pub preload_scripts: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 100,
            message_capacity: 128,
            alias_window: 10,
            preload_scripts: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Set the call-depth bound.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set the diagnostic buffer capacity.
    #[must_use]
    pub fn with_message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity;
        self
    }

    /// Set the alias window.
    #[must_use]
    pub fn with_alias_window(mut self, window: u32) -> Self {
        self.alias_window = window;
        self
    }

    /// Add a script to load at startup.
    #[must_use]
    pub fn with_preload(mut self, name: impl Into<String>) -> Self {
        self.preload_scripts.push(name.into());
        self
    }
}
