//! Process-wide capability flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether relays should still be asked for `--aceh` compatibility mode.
///
/// Starts active and turns off for good the first time a relay answers
/// with the `--t` probe. Clones share the flag.
#[derive(Debug, Clone)]
pub struct AcehProbe(Arc<AtomicBool>);

impl AcehProbe {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Turn the probe off. Returns true for the call that changed it.
    pub fn disable(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for AcehProbe {
    fn default() -> Self {
        Self::new(true)
    }
}
