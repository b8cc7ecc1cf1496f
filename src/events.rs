//! A per-component, named-event observer list (spec §9 "Event emitter").
//!
//! Listeners fire synchronously, in insertion order; a `once` listener
//! removes itself before its next would-be invocation. A listener
//! registered with [`EventBus::on`] can also be removed early with
//! [`EventBus::off`], keyed by the [`ListenerId`] `on` returns.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

type Listener<E> = Box<dyn FnMut(&E) -> bool + Send>;

/// Handle returned by [`EventBus::on`], usable with [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<E> {
    id: u64,
    listener: Listener<E>,
}

pub struct EventBus<E> {
    listeners: Mutex<Vec<Entry<E>>>,
    next_id: AtomicU64,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener that fires on every emission until removed with
    /// [`Self::off`] or the bus is dropped.
    pub fn on(&self, mut f: impl FnMut(&E) + Send + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Entry {
            id,
            listener: Box::new(move |e| {
                f(e);
                true
            }),
        });
        ListenerId(id)
    }

    /// Registers a listener that fires exactly once, then self-removes.
    pub fn once(&self, f: impl FnOnce(&E) + Send + 'static) {
        let mut f = Some(f);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Entry {
            id,
            listener: Box::new(move |e| {
                if let Some(f) = f.take() {
                    f(e);
                }
                false
            }),
        });
    }

    /// Removes a listener registered with [`Self::on`]. No-op if it already
    /// removed itself or was never registered on this bus.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|e| e.id != id.0);
    }

    /// Invokes every listener with `event`, in insertion order, dropping
    /// any that have asked to be removed.
    pub fn emit(&self, event: &E) {
        self.listeners.lock().retain_mut(|e| (e.listener)(event));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn listeners_fire_in_insertion_order() {
        let bus: EventBus<u32> = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.on(move |e| o1.lock().push((1, *e)));
        bus.on(move |e| o2.lock().push((2, *e)));
        bus.emit(&42);
        assert_eq!(*order.lock(), vec![(1, 42), (2, 42)]);
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let bus: EventBus<u32> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.once(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&1);
        bus.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn off_stops_a_listener_from_firing_again() {
        let bus: EventBus<u32> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&1);
        bus.off(id);
        bus.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
