//! # Readiness monitor: parks waiters on assets that are not ready yet.
//!
//! An *asset* is anything a job can wait for: a managed resource still
//! loading, an asynchronous flow still running. Each asset lives in exactly
//! one [`ReadinessMonitor`]; the binder creates one monitor per resource
//! binding, per asynchronous flow and per function, so unrelated waits never
//! share a queue.
//!
//! ```text
//!  register_asset ──► Pending ──notify_ready──► Ready   (waiters resume Ready, FIFO)
//!                        │   ───fail────────► Failed  (waiters resume Failed)
//!                        └───check_timeouts─► Failed  (waiters resume TimedOut)
//! ```
//!
//! ## Rules
//! - Waiters are resumed **outside** the monitor lock, in registration order.
//! - [`register_waiter`](ReadinessMonitor::register_waiter) on an asset that
//!   has already settled hands the waiter straight back
//!   ([`Registration::Settled`]); a wake-up is never lost.
//! - *Persistent* assets remember their final state until removed
//!   (resources). *Transient* assets have a single waiter (flows): they are
//!   forgotten once ready, or once a failure or timeout reached the waiter.
//!   An unknown key therefore reads as ready.
//! - A deadline is fixed when the asset is registered.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::escalation::Escalation;
use crate::sync::lock;

/// Identifies one asset inside one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey(u64);

impl AssetKey {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Outcome delivered to a resumed waiter.
#[derive(Debug, Clone)]
pub enum Readiness {
    /// The asset became ready.
    Ready,
    /// The asset failed or was removed.
    Failed(Escalation),
    /// The asset's deadline passed first.
    TimedOut(Escalation),
}

impl Readiness {
    /// The escalation carried by a failure or timeout.
    pub fn escalation(&self) -> Option<&Escalation> {
        match self {
            Readiness::Ready => None,
            Readiness::Failed(e) | Readiness::TimedOut(e) => Some(e),
        }
    }
}

/// Something that can be parked on an asset and resumed later.
pub trait Waiter: Send + 'static {
    fn resume(self, readiness: Readiness);
}

/// Result of [`ReadinessMonitor::register_waiter`].
#[must_use]
pub enum Registration<W> {
    /// The waiter is parked and will be resumed later.
    Parked,
    /// The asset has already settled; the waiter is returned to the caller.
    Settled(W, Readiness),
}

/// Asset whose deadline passed during [`ReadinessMonitor::check_timeouts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOutAsset {
    pub key: AssetKey,
    pub timeout: Duration,
}

enum AssetState {
    Pending,
    Ready,
    Failed(Escalation),
}

struct Asset<W> {
    transient: bool,
    state: AssetState,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    waiters: VecDeque<(u64, W)>,
}

struct Inner<W> {
    next_key: u64,
    next_seq: u64,
    assets: HashMap<u64, Asset<W>>,
}

/// Tracks assets of one kind and the waiters parked on them.
pub struct ReadinessMonitor<W> {
    name: String,
    inner: Mutex<Inner<W>>,
}

impl<W: Waiter> ReadinessMonitor<W> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                next_key: 1,
                next_seq: 0,
                assets: HashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a persistent asset (remembers ready/failed).
    pub fn register_asset(&self, timeout: Option<Duration>) -> AssetKey {
        self.insert(timeout, false)
    }

    /// Registers a transient asset (forgotten once settled for its waiter).
    pub fn register_transient(&self, timeout: Option<Duration>) -> AssetKey {
        self.insert(timeout, true)
    }

    fn insert(&self, timeout: Option<Duration>, transient: bool) -> AssetKey {
        let mut inner = lock(&self.inner);
        let key = inner.next_key;
        inner.next_key += 1;
        inner.assets.insert(
            key,
            Asset {
                transient,
                state: AssetState::Pending,
                timeout,
                deadline: timeout.map(|t| Instant::now() + t),
                waiters: VecDeque::new(),
            },
        );
        AssetKey(key)
    }

    /// Parks `waiter` on `key`, or hands it back if the asset has settled.
    ///
    /// An unknown key (never registered, or a transient asset already ready)
    /// settles as [`Readiness::Ready`].
    pub fn register_waiter(&self, key: AssetKey, waiter: W) -> Registration<W> {
        let mut inner = lock(&self.inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let Some(asset) = inner.assets.get_mut(&key.0) else {
            return Registration::Settled(waiter, Readiness::Ready);
        };
        let settled = match &asset.state {
            AssetState::Pending => {
                asset.waiters.push_back((seq, waiter));
                return Registration::Parked;
            }
            AssetState::Ready => Readiness::Ready,
            AssetState::Failed(e) => Readiness::Failed(e.clone()),
        };
        if asset.transient {
            inner.assets.remove(&key.0);
        }
        Registration::Settled(waiter, settled)
    }

    /// Marks the asset ready and resumes its waiters.
    ///
    /// Returns `false` if the asset is unknown or already settled.
    pub fn notify_ready(&self, key: AssetKey) -> bool {
        self.settle(key, AssetState::Ready, Readiness::Ready)
    }

    /// Marks the asset failed and resumes its waiters with the escalation.
    pub fn fail(&self, key: AssetKey, escalation: Escalation) -> bool {
        self.settle(
            key,
            AssetState::Failed(escalation.clone()),
            Readiness::Failed(escalation),
        )
    }

    fn settle(&self, key: AssetKey, state: AssetState, readiness: Readiness) -> bool {
        let waiters = {
            let mut inner = lock(&self.inner);
            let Some(asset) = inner.assets.get_mut(&key.0) else {
                return false;
            };
            if !matches!(asset.state, AssetState::Pending) {
                return false;
            }
            let waiters = std::mem::take(&mut asset.waiters);
            let forget = asset.transient && (matches!(state, AssetState::Ready) || !waiters.is_empty());
            asset.state = state;
            if forget {
                inner.assets.remove(&key.0);
            }
            waiters
        };
        for (_, waiter) in waiters {
            waiter.resume(readiness.clone());
        }
        true
    }

    /// Times out every pending asset whose deadline is at or before `now`.
    ///
    /// Their waiters resume with [`Readiness::TimedOut`] in global
    /// registration order. Persistent assets, and transient ones nobody
    /// waits on yet, stay failed so late waiters see the timeout too.
    pub fn check_timeouts(&self, now: Instant) -> Vec<TimedOutAsset> {
        let mut expired = Vec::new();
        let mut resumed: Vec<(u64, W, Escalation)> = Vec::new();
        {
            let mut inner = lock(&self.inner);
            let mut forget = Vec::new();
            for (key, asset) in inner.assets.iter_mut() {
                let due = matches!(asset.state, AssetState::Pending)
                    && asset.deadline.is_some_and(|d| d <= now);
                if !due {
                    continue;
                }
                let timeout = asset.timeout.unwrap_or_default();
                let escalation = Escalation::timeout(&self.name, timeout);
                asset.state = AssetState::Failed(escalation.clone());
                if asset.transient && !asset.waiters.is_empty() {
                    forget.push(*key);
                }
                for (seq, waiter) in asset.waiters.drain(..) {
                    resumed.push((seq, waiter, escalation.clone()));
                }
                expired.push(TimedOutAsset {
                    key: AssetKey(*key),
                    timeout,
                });
            }
            for key in forget {
                inner.assets.remove(&key);
            }
        }
        resumed.sort_by_key(|(seq, _, _)| *seq);
        for (_, waiter, escalation) in resumed {
            waiter.resume(Readiness::TimedOut(escalation));
        }
        expired.sort_by_key(|t| t.key);
        expired
    }

    /// Forgets the asset; parked waiters resume failed.
    pub fn remove_asset(&self, key: AssetKey) -> bool {
        let Some(asset) = lock(&self.inner).assets.remove(&key.0) else {
            return false;
        };
        if !asset.waiters.is_empty() {
            let escalation = Escalation::failure(format!("asset removed from {}", self.name));
            for (_, waiter) in asset.waiters {
                waiter.resume(Readiness::Failed(escalation.clone()));
            }
        }
        true
    }

    /// `true` while the asset is registered and not yet settled.
    pub fn is_pending(&self, key: AssetKey) -> bool {
        lock(&self.inner)
            .assets
            .get(&key.0)
            .is_some_and(|a| matches!(a.state, AssetState::Pending))
    }

    /// Number of waiters currently parked across all assets.
    pub fn parked(&self) -> usize {
        lock(&self.inner).assets.values().map(|a| a.waiters.len()).sum()
    }

    /// Number of assets still tracked, settled or not.
    #[cfg(test)]
    pub(crate) fn assets(&self) -> usize {
        lock(&self.inner).assets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::CauseType;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(u32, &'static str)>>>;

    struct Probe(u32, Log);

    impl Waiter for Probe {
        fn resume(self, readiness: Readiness) {
            let tag = match readiness {
                Readiness::Ready => "ready",
                Readiness::Failed(_) => "failed",
                Readiness::TimedOut(_) => "timeout",
            };
            self.1.lock().unwrap().push((self.0, tag));
        }
    }

    fn parked(r: Registration<Probe>) {
        assert!(matches!(r, Registration::Parked));
    }

    #[test]
    fn ready_resumes_waiters_in_fifo_order() {
        let log: Log = Arc::default();
        let m = ReadinessMonitor::new("resource:db");
        let key = m.register_asset(None);
        for i in 0..5 {
            parked(m.register_waiter(key, Probe(i, log.clone())));
        }
        assert_eq!(m.parked(), 5);
        assert!(m.notify_ready(key));
        assert!(!m.notify_ready(key));

        let order: Vec<u32> = log.lock().unwrap().iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(!m.is_pending(key));
    }

    #[test]
    fn late_waiter_on_settled_asset_is_handed_back() {
        let m: ReadinessMonitor<Probe> = ReadinessMonitor::new("resource:db");
        let key = m.register_asset(None);
        m.notify_ready(key);
        match m.register_waiter(key, Probe(0, Arc::default())) {
            Registration::Settled(_, Readiness::Ready) => {}
            _ => panic!("expected settled ready"),
        }

        let failed = m.register_asset(None);
        m.fail(failed, Escalation::new(CauseType::new("IOFailure"), "gone"));
        match m.register_waiter(failed, Probe(1, Arc::default())) {
            Registration::Settled(_, Readiness::Failed(e)) => assert_eq!(e.cause().name(), "IOFailure"),
            _ => panic!("expected settled failure"),
        }
    }

    #[test]
    fn transient_asset_is_forgotten_once_ready() {
        let m: ReadinessMonitor<Probe> = ReadinessMonitor::new("flow:a.f.x");
        let key = m.register_transient(None);
        m.notify_ready(key);
        assert!(!m.remove_asset(key));
        assert!(matches!(
            m.register_waiter(key, Probe(0, Arc::default())),
            Registration::Settled(_, Readiness::Ready)
        ));
    }

    #[test]
    fn deadline_times_out_waiters_and_late_arrivals() {
        let log: Log = Arc::default();
        let m = ReadinessMonitor::new("resource:slow");
        let key = m.register_asset(Some(Duration::from_millis(10)));
        parked(m.register_waiter(key, Probe(7, log.clone())));

        assert!(m.check_timeouts(Instant::now()).is_empty());
        let expired = m.check_timeouts(Instant::now() + Duration::from_millis(20));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].timeout, Duration::from_millis(10));
        assert_eq!(*log.lock().unwrap(), vec![(7, "timeout")]);

        match m.register_waiter(key, Probe(8, log.clone())) {
            Registration::Settled(_, r) => assert!(r.escalation().unwrap().is(&CauseType::timeout())),
            Registration::Parked => panic!("late waiter must not park"),
        }
    }

    #[test]
    fn settled_transient_assets_are_dropped_once_their_waiter_resumed() {
        let log: Log = Arc::default();
        let m = ReadinessMonitor::new("flow:a.f.audit");

        let timed_out = m.register_transient(Some(Duration::from_millis(10)));
        parked(m.register_waiter(timed_out, Probe(1, log.clone())));
        let failed = m.register_transient(None);
        parked(m.register_waiter(failed, Probe(2, log.clone())));
        m.fail(failed, Escalation::failure("audit crashed"));
        m.check_timeouts(Instant::now() + Duration::from_millis(20));

        assert_eq!(*log.lock().unwrap(), vec![(2, "failed"), (1, "timeout")]);
        assert_eq!(m.assets(), 0);
    }

    #[test]
    fn transient_failure_waits_for_its_waiter() {
        let m = ReadinessMonitor::new("flow:a.f.audit");
        let key = m.register_transient(Some(Duration::from_millis(10)));
        assert_eq!(m.check_timeouts(Instant::now() + Duration::from_millis(20)).len(), 1);
        assert_eq!(m.assets(), 1);

        match m.register_waiter(key, Probe(0, Arc::default())) {
            Registration::Settled(_, r) => assert!(r.escalation().unwrap().is(&CauseType::timeout())),
            Registration::Parked => panic!("timed-out flow must not park"),
        }
        assert_eq!(m.assets(), 0);
    }

    #[test]
    fn removal_fails_parked_waiters() {
        let log: Log = Arc::default();
        let m = ReadinessMonitor::new("function:a.f");
        let key = m.register_transient(None);
        parked(m.register_waiter(key, Probe(1, log.clone())));
        assert!(m.remove_asset(key));
        assert_eq!(*log.lock().unwrap(), vec![(1, "failed")]);
    }
}
