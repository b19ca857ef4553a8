//! Single-flight gate for the on-demand analysis action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ScanGate {
    busy: AtomicBool,
}

impl ScanGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the gate. Returns `None` while another scan holds it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ScanPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanPermit {
                gate: Arc::clone(self),
            })
    }
}

/// Proof of holding the gate; releases it when dropped, on every exit path.
#[derive(Debug)]
pub struct ScanPermit {
    gate: Arc<ScanGate>,
}

impl Drop for ScanPermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
