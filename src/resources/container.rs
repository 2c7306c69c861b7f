use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::monitor::Waiter;
use crate::resources::{CleanupEscalations, ResourceSlot};
use crate::sync::lock;

struct Slots<W> {
    by_index: HashMap<usize, Arc<ResourceSlot<W>>>,
    order: Vec<Arc<ResourceSlot<W>>>,
    recycled: bool,
}

/// Resource slots owned by one scope instance (floor, process, thread or job).
///
/// Slots are keyed by the resource binding's index and remembered in
/// creation order. Jobs request a function's resources in dependency order,
/// so reverse creation order recycles dependents before their dependencies.
pub struct ResourceContainer<W> {
    slots: Mutex<Slots<W>>,
}

impl<W: Waiter> Default for ResourceContainer<W> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slots {
                by_index: HashMap::new(),
                order: Vec::new(),
                recycled: false,
            }),
        }
    }
}

impl<W: Waiter> ResourceContainer<W> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for binding `index`, creating it with `make` on first use.
    ///
    /// Returns `None` once the container has been recycled.
    pub fn slot(
        &self,
        index: usize,
        make: impl FnOnce() -> Arc<ResourceSlot<W>>,
    ) -> Option<Arc<ResourceSlot<W>>> {
        let mut slots = lock(&self.slots);
        if slots.recycled {
            return None;
        }
        if let Some(slot) = slots.by_index.get(&index) {
            return Some(Arc::clone(slot));
        }
        let slot = make();
        slots.by_index.insert(index, Arc::clone(&slot));
        slots.order.push(Arc::clone(&slot));
        Some(slot)
    }

    /// The slot for binding `index`, if one was created.
    pub fn get(&self, index: usize) -> Option<Arc<ResourceSlot<W>>> {
        lock(&self.slots).by_index.get(&index).cloned()
    }

    /// Recycles every slot exactly once, newest first.
    ///
    /// Failures are collected into `cleanup`; they never stop the remaining
    /// slots from being recycled. Returns how many resources were released.
    /// Later calls are no-ops.
    pub fn recycle(&self, cleanup: &mut CleanupEscalations) -> usize {
        let order = {
            let mut slots = lock(&self.slots);
            if slots.recycled {
                return 0;
            }
            slots.recycled = true;
            slots.by_index.clear();
            std::mem::take(&mut slots.order)
        };
        order
            .iter()
            .rev()
            .filter(|slot| slot.recycle(cleanup))
            .count()
    }
}
