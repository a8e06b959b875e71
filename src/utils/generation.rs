use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter tagging a logical session.
///
/// Async continuations capture the value at their start and compare it at
/// resumption; a mismatch means the owning component was torn down or
/// restarted in the meantime and the continuation must not touch shared state.
#[derive(Debug, Default)]
pub struct Generation {
    value: AtomicU64,
}

impl Generation {
    pub fn new() -> Generation {
        Generation {
            value: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Invalidates every outstanding tag and returns the new one.
    pub fn bump(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn still(&self, tag: u64) -> bool {
        self.current() == tag
    }
}
