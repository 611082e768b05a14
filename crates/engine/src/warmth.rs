//! Registry warmth flag.
//!
//! Jobs warn once when they start against an empty parser store. This
//! flag records that the store has been seen non-empty, so later jobs
//! skip the row count. A refresh warms it; clearing the store resets it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag recording that the parser store is known non-empty.
#[derive(Debug, Default)]
pub struct RegistryWarmth {
    warm: AtomicBool,
}

impl RegistryWarmth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the store has been seen non-empty.
    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Relaxed)
    }

    /// Record that parser records are known to exist.
    pub fn mark_warm(&self) {
        self.warm.store(true, Ordering::Relaxed);
    }

    /// Forget warmth, forcing the next job to re-check the store.
    pub fn invalidate(&self) {
        self.warm.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmth_lifecycle() {
        let warmth = RegistryWarmth::new();
        assert!(!warmth.is_warm());

        warmth.mark_warm();
        assert!(warmth.is_warm());

        warmth.invalidate();
        assert!(!warmth.is_warm());
    }
}
