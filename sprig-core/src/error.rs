//! Error Types
//!
//! Everything that can go wrong while rendering or committing a fiber tree.
//!
//! Errors fall into two classes:
//!
//! - **Usage errors** violate a structural invariant the caller has to fix
//!   (hook order changed between renders, a fiber that is not attached to a
//!   root). They abort the render immediately and are never retried.
//! - **Render errors** are reported by a component while it renders. The
//!   render cycle discards its work-in-progress tree and starts again from a
//!   fresh stack, up to `ReconcilerConfig::max_render_attempts` times.

use thiserror::Error;

use crate::hooks::HookKind;

/// Result alias used throughout the crate.
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

/// Errors produced by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A component called a different number of hooks than on its previous
    /// render.
    #[error("component rendered {rendered} hooks but its previous render called {previous}")]
    HookCountMismatch {
        /// Hooks recorded by the previous render.
        previous: usize,
        /// Hooks called by this render when the mismatch was detected.
        rendered: usize,
    },

    /// The hook at `index` is of a different kind than on the previous render.
    #[error("hook #{index} was {expected:?} on the previous render but is now {found:?}")]
    HookKindMismatch {
        /// Position of the hook in call order.
        index: usize,
        /// Kind recorded by the previous render.
        expected: HookKind,
        /// Kind called by this render.
        found: HookKind,
    },

    /// The hook at `index` holds a value of a different type than requested.
    #[error("hook #{index} holds a value of a different type than requested")]
    HookStateType {
        /// Position of the hook in call order.
        index: usize,
    },

    /// Walking `return` links from a fiber did not end at a root fiber.
    #[error("fiber is not attached to a root")]
    DetachedFiber,

    /// A component failed to render.
    #[error("component `{component}` failed to render: {message}")]
    Render {
        /// Name of the failing component.
        component: String,
        /// What went wrong.
        message: String,
    },

    /// The render cycle kept failing and gave up.
    #[error("render did not complete after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
    },

    /// Renders kept scheduling further renders.
    #[error("too many nested re-renders (limit {limit})")]
    TooManyRerenders {
        /// The configured limit.
        limit: usize,
    },
}

impl ReconcileError {
    /// Build a render error for the named component.
    pub fn render(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a usage error that must not be retried.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::HookCountMismatch { .. }
                | Self::HookKindMismatch { .. }
                | Self::HookStateType { .. }
                | Self::DetachedFiber
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_errors_are_usage_errors() {
        let err = ReconcileError::HookCountMismatch {
            previous: 1,
            rendered: 2,
        };
        assert!(err.is_usage_error());
        assert!(ReconcileError::DetachedFiber.is_usage_error());
    }

    #[test]
    fn render_errors_are_retryable() {
        let err = ReconcileError::render("App", "boom");
        assert!(!err.is_usage_error());
        assert_eq!(err.to_string(), "component `App` failed to render: boom");
    }
}
