//! # Resource slot: single-flight activation of one scoped resource.
//!
//! ```text
//!            activate (first caller)           ready() / ready_now
//!  Empty ───────────────────────────► Loading ─────────────────────► Ready
//!                                        │  fail() / create error        │
//!                                        └──────────────────► Failed     │
//!                                                               │        │
//!                               recycle ◄───────────────────────┴────────┘
//!                                  ▼
//!                              Recycled
//! ```
//!
//! The first caller creates the resource (outside the lock); every later
//! caller gets [`Activation::Pending`] with the same asset key and parks on
//! the slot's readiness monitor. A `ready()` arriving before `create`
//! returns is remembered and applied as soon as the resource is stored.
//! The asset stays registered for the slot's lifetime and is removed from
//! the monitor when the slot is recycled.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::escalation::{CauseType, Escalation};
use crate::monitor::{AssetKey, ReadinessMonitor, Waiter};
use crate::payload::Payload;
use crate::resources::{
    CleanupEscalations, ManagedResource, ResourceContext, ResourceFactory, ResourceReadiness,
};
use crate::resources::factory::ReadySignal;
use crate::sync::lock;

/// Outcome of [`ResourceSlot::activate`].
pub enum Activation {
    /// The resource is usable; here is its object.
    Ready(Payload),
    /// The resource is loading; park on the slot's monitor with this key.
    Pending(AssetKey),
    /// Sourcing failed (now or earlier).
    Failed(Escalation),
}

enum SlotState {
    Empty,
    Loading {
        asset: AssetKey,
        resource: Option<Box<dyn ManagedResource>>,
        signalled: Option<Result<(), Escalation>>,
    },
    Ready {
        asset: AssetKey,
        resource: Box<dyn ManagedResource>,
    },
    Failed {
        asset: AssetKey,
        escalation: Escalation,
        resource: Option<Box<dyn ManagedResource>>,
    },
    Recycled,
}

/// One resource instance within one scope.
pub struct ResourceSlot<W> {
    name: Arc<str>,
    monitor: Arc<ReadinessMonitor<W>>,
    timeout: Option<Duration>,
    state: Mutex<SlotState>,
}

/// Notification the monitor must receive once the slot lock is released.
enum Notify {
    None,
    Ready(AssetKey),
    Fail(AssetKey, Escalation),
}

impl<W: Waiter> ResourceSlot<W> {
    pub fn new(
        name: impl Into<Arc<str>>,
        monitor: Arc<ReadinessMonitor<W>>,
        timeout: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            monitor,
            timeout,
            state: Mutex::new(SlotState::Empty),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The monitor pending activations park on.
    pub fn monitor(&self) -> &Arc<ReadinessMonitor<W>> {
        &self.monitor
    }

    /// Activates the resource at most once.
    ///
    /// `dependencies` are the objects of the binding's dependencies in
    /// declared order; only the first caller's are used.
    pub fn activate(
        self: &Arc<Self>,
        factory: &dyn ResourceFactory,
        dependencies: &[Payload],
    ) -> Activation {
        let asset = {
            let mut state = lock(&self.state);
            match &*state {
                SlotState::Ready { resource, .. } => return Activation::Ready(resource.object()),
                SlotState::Loading { asset, .. } => return Activation::Pending(*asset),
                SlotState::Failed { escalation, .. } => return Activation::Failed(escalation.clone()),
                SlotState::Recycled => return Activation::Failed(self.recycled()),
                SlotState::Empty => {}
            }
            let asset = self.monitor.register_asset(self.timeout);
            *state = SlotState::Loading {
                asset,
                resource: None,
                signalled: None,
            };
            asset
        };

        let signal: Arc<dyn ReadySignal> = Arc::new(SlotSignal {
            slot: Arc::downgrade(self),
        });
        let mut ctx = ResourceContext::new(&self.name, dependencies, ResourceReadiness::new(signal));
        let created = catch_unwind(AssertUnwindSafe(|| factory.create(&mut ctx)))
            .unwrap_or_else(|panic| Err(Escalation::from_panic(&*panic)));

        let (activation, notify) = {
            let mut state = lock(&self.state);
            let previous = std::mem::replace(&mut *state, SlotState::Recycled);
            let signalled = match previous {
                SlotState::Loading { signalled, .. } => signalled,
                other => {
                    // Recycled while sourcing; release what was just created.
                    *state = other;
                    if let Ok(sourced) = created {
                        let mut sink = CleanupEscalations::new();
                        sourced.resource.recycle(&mut sink);
                    }
                    return Activation::Failed(self.recycled());
                }
            };
            match (created, signalled) {
                (Err(escalation), _) => {
                    *state = SlotState::Failed {
                        asset,
                        escalation: escalation.clone(),
                        resource: None,
                    };
                    (
                        Activation::Failed(escalation.clone()),
                        Notify::Fail(asset, escalation),
                    )
                }
                (Ok(sourced), Some(Err(escalation))) => {
                    *state = SlotState::Failed {
                        asset,
                        escalation: escalation.clone(),
                        resource: Some(sourced.resource),
                    };
                    (
                        Activation::Failed(escalation.clone()),
                        Notify::Fail(asset, escalation),
                    )
                }
                (Ok(sourced), signalled) => {
                    if sourced.ready_now || signalled.is_some() {
                        let object = sourced.resource.object();
                        *state = SlotState::Ready {
                            asset,
                            resource: sourced.resource,
                        };
                        (Activation::Ready(object), Notify::Ready(asset))
                    } else {
                        *state = SlotState::Loading {
                            asset,
                            resource: Some(sourced.resource),
                            signalled: None,
                        };
                        (Activation::Pending(asset), Notify::None)
                    }
                }
            }
        };
        self.notify(notify);
        activation
    }

    fn signal(&self, outcome: Result<(), Escalation>) {
        let notify = {
            let mut state = lock(&self.state);
            let previous = std::mem::replace(&mut *state, SlotState::Recycled);
            let (next, notify) = match (previous, outcome) {
                (
                    SlotState::Loading {
                        asset,
                        resource: None,
                        signalled,
                    },
                    outcome,
                ) => (
                    SlotState::Loading {
                        asset,
                        resource: None,
                        signalled: signalled.or(Some(outcome)),
                    },
                    Notify::None,
                ),
                (
                    SlotState::Loading {
                        asset,
                        resource: Some(resource),
                        ..
                    },
                    Ok(()),
                ) => (SlotState::Ready { asset, resource }, Notify::Ready(asset)),
                (
                    SlotState::Loading {
                        asset,
                        resource: Some(resource),
                        ..
                    },
                    Err(escalation),
                ) => (
                    SlotState::Failed {
                        asset,
                        escalation: escalation.clone(),
                        resource: Some(resource),
                    },
                    Notify::Fail(asset, escalation),
                ),
                (other, _) => (other, Notify::None),
            };
            *state = next;
            notify
        };
        self.notify(notify);
    }

    fn notify(&self, notify: Notify) {
        match notify {
            Notify::None => {}
            Notify::Ready(asset) => {
                self.monitor.notify_ready(asset);
            }
            Notify::Fail(asset, escalation) => {
                self.monitor.fail(asset, escalation);
            }
        }
    }

    fn recycled(&self) -> Escalation {
        Escalation::new(
            CauseType::resource_failure(),
            format!("resource '{}' already recycled", self.name),
        )
    }

    /// `true` once the resource is usable.
    pub fn is_ready(&self) -> bool {
        matches!(*lock(&self.state), SlotState::Ready { .. })
    }

    /// The resource object, if ready.
    pub fn object(&self) -> Option<Payload> {
        match &*lock(&self.state) {
            SlotState::Ready { resource, .. } => Some(resource.object()),
            _ => None,
        }
    }

    /// A named extension of the resource, if ready and exposed.
    pub fn extension(&self, name: &str) -> Option<Payload> {
        match &*lock(&self.state) {
            SlotState::Ready { resource, .. } => resource.extension(name),
            _ => None,
        }
    }

    /// Recycles the resource once. Returns `true` if a resource was released.
    ///
    /// The slot's asset is removed from the monitor; waiters still parked on
    /// a loading resource fail.
    pub fn recycle(&self, cleanup: &mut CleanupEscalations) -> bool {
        let previous = std::mem::replace(&mut *lock(&self.state), SlotState::Recycled);
        let (resource, asset) = match previous {
            SlotState::Ready { asset, resource } => (Some(resource), Some(asset)),
            SlotState::Loading { asset, resource, .. } | SlotState::Failed { asset, resource, .. } => {
                (resource, Some(asset))
            }
            SlotState::Empty | SlotState::Recycled => (None, None),
        };
        if let Some(asset) = asset {
            self.monitor.remove_asset(asset);
        }
        let Some(resource) = resource else {
            return false;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| resource.recycle(cleanup))) {
            cleanup.push(Escalation::from_panic(&*panic));
        }
        true
    }
}

struct SlotSignal<W> {
    slot: Weak<ResourceSlot<W>>,
}

impl<W: Waiter> ReadySignal for SlotSignal<W> {
    fn signal(&self, outcome: Result<(), Escalation>) {
        if let Some(slot) = self.slot.upgrade() {
            slot.signal(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{Readiness, Registration};
    use crate::payload::{downcast, payload};
    use crate::resources::{ResourceFn, SimpleResource, Sourced};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flag(Arc<Mutex<Option<bool>>>);

    impl Waiter for Flag {
        fn resume(self, readiness: Readiness) {
            *self.0.lock().unwrap() = Some(matches!(readiness, Readiness::Ready));
        }
    }

    fn monitor() -> Arc<ReadinessMonitor<Flag>> {
        Arc::new(ReadinessMonitor::new("resource:test"))
    }

    #[test]
    fn activates_once_and_recycles_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let recycled = Arc::new(AtomicUsize::new(0));
        let (c, r) = (created.clone(), recycled.clone());
        let factory = ResourceFn::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            let r = r.clone();
            Ok(Sourced::ready(SimpleResource::new(payload(5_u8)).on_recycle(move || {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
        });

        let slot = ResourceSlot::new("db", monitor(), None);
        for _ in 0..3 {
            match slot.activate(&factory, &[]) {
                Activation::Ready(obj) => assert_eq!(downcast::<u8>(&obj).as_deref(), Some(&5)),
                _ => panic!("expected ready"),
            }
        }
        assert_eq!(slot.monitor().assets(), 1);
        let mut cleanup = CleanupEscalations::new();
        assert!(slot.recycle(&mut cleanup));
        assert!(!slot.recycle(&mut cleanup));
        assert_eq!(slot.monitor().assets(), 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(recycled.load(Ordering::SeqCst), 1);
        assert!(matches!(slot.activate(&factory, &[]), Activation::Failed(_)));
    }

    #[test]
    fn pending_resource_wakes_parked_waiter() {
        let handle: Arc<Mutex<Option<ResourceReadiness>>> = Arc::default();
        let h = handle.clone();
        let factory = ResourceFn::new(move |ctx| {
            *h.lock().unwrap() = Some(ctx.readiness());
            Ok(Sourced::pending(SimpleResource::new(payload("conn"))))
        });

        let slot = ResourceSlot::new("conn", monitor(), None);
        let Activation::Pending(asset) = slot.activate(&factory, &[]) else {
            panic!("expected pending");
        };
        assert!(matches!(slot.activate(&factory, &[]), Activation::Pending(a) if a == asset));

        let woke = Arc::new(Mutex::new(None));
        assert!(matches!(
            slot.monitor().register_waiter(asset, Flag(woke.clone())),
            Registration::Parked
        ));
        handle.lock().unwrap().as_ref().unwrap().ready();
        assert_eq!(*woke.lock().unwrap(), Some(true));
        assert!(slot.is_ready());
    }

    #[test]
    fn ready_signal_during_create_is_not_lost() {
        let factory = ResourceFn::new(|ctx| {
            ctx.readiness().ready();
            Ok(Sourced::pending(SimpleResource::new(payload(1_i32))))
        });
        let slot = ResourceSlot::new("eager", monitor(), None);
        assert!(matches!(slot.activate(&factory, &[]), Activation::Ready(_)));
    }

    #[test]
    fn panicking_factory_fails_the_slot() {
        let factory = ResourceFn::new(|_| panic!("no disk"));
        let slot = ResourceSlot::new("disk", monitor(), None);
        match slot.activate(&factory, &[]) {
            Activation::Failed(e) => {
                assert!(e.is(&CauseType::panic()));
                assert_eq!(e.message(), "no disk");
            }
            _ => panic!("expected failure"),
        }
        assert!(matches!(slot.activate(&factory, &[]), Activation::Failed(_)));

        assert!(!slot.recycle(&mut CleanupEscalations::new()));
        assert_eq!(slot.monitor().assets(), 0);
    }
}
