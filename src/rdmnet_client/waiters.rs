//! Ordered predicate/deadline/resolver waiter table (spec §4.7/§9
//! "Request/response correlation").
//!
//! Every inbound message is offered to each registered waiter in insertion
//! order; a waiter whose predicate matches is removed from the table before
//! its resolver is invoked, so a single packet can never resolve the same
//! waiter twice. Waiters that time out reject with `ResponseTimeout`;
//! waiters still pending when the connection drops reject with a
//! socket-closed error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{DmxNetError, Result};

struct WaiterEntry<T> {
    id: u64,
    matcher: Box<dyn Fn(&T) -> bool + Send>,
    resolver: oneshot::Sender<Result<T>>,
}

pub struct WaiterTable<T> {
    next_id: AtomicU64,
    waiters: parking_lot::Mutex<Vec<WaiterEntry<T>>>,
}

impl<T: Clone + Send + 'static> WaiterTable<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            waiters: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Registers a waiter and spawns its timeout. `self` must be shared via
    /// `Arc` so the timeout task can reach back into the table.
    pub fn register(
        self: &Arc<Self>,
        matcher: impl Fn(&T) -> bool + Send + 'static,
        timeout_duration: Duration,
    ) -> oneshot::Receiver<Result<T>> {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.waiters.lock().push(WaiterEntry {
            id,
            matcher: Box::new(matcher),
            resolver: tx,
        });

        let table = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout_duration).await;
            table.expire(id);
        });

        rx
    }

    fn expire(&self, id: u64) {
        let mut waiters = self.waiters.lock();
        if let Some(pos) = waiters.iter().position(|w| w.id == id) {
            let entry = waiters.remove(pos);
            let _ = entry.resolver.send(Err(DmxNetError::ResponseTimeout));
        }
    }

    /// Offers `value` to every pending waiter. Matching waiters are removed
    /// before their resolvers fire.
    pub fn dispatch(&self, value: &T) {
        let mut matched = Vec::new();
        {
            let mut waiters = self.waiters.lock();
            let mut i = 0;
            while i < waiters.len() {
                if (waiters[i].matcher)(value) {
                    matched.push(waiters.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        for entry in matched {
            let _ = entry.resolver.send(Ok(value.clone()));
        }
    }

    /// Rejects every pending waiter with a socket-closed error. Called when
    /// the transport disconnects.
    pub fn reject_all_socket_closed(&self) {
        let waiters = std::mem::take(&mut *self.waiters.lock());
        for entry in waiters {
            let _ = entry.resolver.send(Err(DmxNetError::SocketClosed));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn dispatch_resolves_matching_waiter_only_once() {
        let table: Arc<WaiterTable<i32>> = WaiterTable::new();
        let rx = table.register(|v| *v == 7, StdDuration::from_secs(5));
        table.dispatch(&7);
        table.dispatch(&7); // second delivery must not resolve anything else
        assert_eq!(rx.await.unwrap().unwrap(), 7);
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn non_matching_values_are_ignored() {
        let table: Arc<WaiterTable<i32>> = WaiterTable::new();
        let rx = table.register(|v| *v == 7, StdDuration::from_secs(5));
        table.dispatch(&1);
        table.dispatch(&2);
        assert_eq!(table.pending_count(), 1);
        table.dispatch(&7);
        assert_eq!(rx.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn unmatched_waiter_times_out() {
        let table: Arc<WaiterTable<i32>> = WaiterTable::new();
        let rx = table.register(|v| *v == 7, StdDuration::from_millis(20));
        let result = rx.await.unwrap();
        assert!(matches!(result, Err(DmxNetError::ResponseTimeout)));
    }

    #[tokio::test]
    async fn reject_all_rejects_pending_waiters() {
        let table: Arc<WaiterTable<i32>> = WaiterTable::new();
        let rx = table.register(|v| *v == 7, StdDuration::from_secs(5));
        table.reject_all_socket_closed();
        assert!(matches!(rx.await.unwrap(), Err(DmxNetError::SocketClosed)));
    }

    #[tokio::test]
    async fn insertion_order_is_preserved_across_matches() {
        let table: Arc<WaiterTable<i32>> = WaiterTable::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let rx1 = table.register(move |v| *v == 1, StdDuration::from_secs(5));
        let rx2 = table.register(move |v| *v == 1, StdDuration::from_secs(5));
        table.dispatch(&1);
        o1.lock().push(rx1.await.unwrap().unwrap());
        o2.lock().push(rx2.await.unwrap().unwrap());
        assert_eq!(*order.lock(), vec![1, 1]);
    }
}
