//! Reconciler Configuration
//!
//! Knobs that control how a root runs its render cycles. Every field has a
//! default, so a config can be loaded from a partial JSON document.

use serde::{Deserialize, Serialize};

/// Configuration for a [`FiberRoot`](crate::root::FiberRoot).
///
/// # Example
///
/// ```rust
/// use sprig_core::ReconcilerConfig;
///
/// let config = ReconcilerConfig::from_json(r#"{ "max_render_attempts": 5 }"#).unwrap();
/// assert_eq!(config.max_render_attempts, 5);
/// assert_eq!(config.nested_update_limit, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// How many times a render cycle is attempted before giving up with
    /// `RetriesExhausted`. Values below one are treated as one.
    pub max_render_attempts: usize,

    /// How many back-to-back cycles a single schedule may run when renders
    /// keep dispatching updates.
    pub nested_update_limit: usize,

    /// Emit development diagnostics (render failures, stale dispatches,
    /// overwritten updates) at `warn` level.
    pub dev_warnings: bool,
}

impl ReconcilerConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub(crate) fn render_attempts(&self) -> usize {
        self.max_render_attempts.max(1)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_render_attempts: 3,
            nested_update_limit: 50,
            dev_warnings: cfg!(debug_assertions),
        }
    }
}
