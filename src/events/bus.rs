//! # Event bus for broadcasting kernel events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking publishing from any thread: worker-team threads, the
//! readiness ticker and the floor itself.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Subscriber (one):
//!   worker threads ──┐
//!   readiness tick ──┼──────► Bus ───────► floor listener ────► SubscriberSet
//!   binder issues  ──┤  (broadcast chan)    (ProcessFloor)
//!   ProcessFloor   ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and needs no runtime context,
//!   so it is safe from plain `std::thread` workers.
//! - **Sequencing**: the bus stamps each event with a monotonic `seq` at publish time.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` events.
//! - **No persistence**: events are lost if nobody is subscribed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for kernel events.
///
/// Cheap to clone; all clones share the channel and the sequence counter.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Stamps the event with the next sequence number and publishes it.
    ///
    /// If there are no receivers the event is dropped.
    pub fn publish(&self, mut ev: Event) {
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn publish_stamps_increasing_sequence() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::ProcessStarted).with_process(1));
        bus.publish(Event::new(EventKind::ProcessCompleted).with_process(1));

        let first = rx.try_recv().expect("first event");
        let second = rx.try_recv().expect("second event");
        assert!(first.seq < second.seq);
        assert_eq!(second.kind, EventKind::ProcessCompleted);
    }

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
