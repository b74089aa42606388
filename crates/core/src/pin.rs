//! Keeps a value alive while detached parties may still act on it.

use std::sync::Arc;

use parking_lot::Mutex;

/// Reference slot that holds a value alive independently of its external
/// owners.
///
/// Acquired when asynchronous work against the value begins and released
/// when that work has settled. Between those points the value survives the
/// external owner dropping its handle; afterwards the strong count falls
/// back to whatever the owner and any mid-flight caller still hold.
pub struct LifetimePin<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> LifetimePin<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Pins `target`. A second acquire replaces the previous pin.
    pub fn acquire(&self, target: Arc<T>) {
        *self.slot.lock() = Some(target);
    }

    /// Releases the pin. Returns `false` when nothing was pinned.
    pub fn release(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    pub fn is_pinned(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Default for LifetimePin<T> {
    fn default() -> Self {
        Self::new()
    }
}
