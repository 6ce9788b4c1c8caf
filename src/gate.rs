//! Process-wide emission switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared enable flag checked before every emission.
///
/// Clones share the same flag. A freshly created gate is closed.
#[derive(Debug, Clone, Default)]
pub struct EnableGate {
    enabled: Arc<AtomicBool>,
}

impl EnableGate {
    /// Creates a gate in the given state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Opens or closes the gate for every clone.
    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// True when emission is allowed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
