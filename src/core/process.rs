//! Process state: the root of one invocation.
//!
//! A process owns its process- and namespace-scoped resources, the
//! namespace state objects, the first unhandled escalation and the cleanup
//! escalations of every scope it ended. It completes when its last thread
//! finishes.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::core::floor::FloorShared;
use crate::core::thread::ParkedJob;
use crate::escalation::Escalation;
use crate::events::{Event, EventKind};
use crate::resources::{CleanupEscalations, ResourceContainer};
use crate::sync::lock;

pub(crate) type StateCell = Arc<Mutex<Box<dyn Any + Send>>>;

pub(crate) struct ProcessState {
    pub(crate) id: u64,
    pub(crate) entry: String,
    /// Process- and namespace-scoped resources.
    pub(crate) resources: ResourceContainer<ParkedJob>,
    states: Mutex<HashMap<usize, StateCell>>,
    live: AtomicUsize,
    failure: Mutex<Option<Escalation>>,
    cleanup: Mutex<Vec<Escalation>>,
    done: watch::Sender<bool>,
}

impl ProcessState {
    pub(crate) fn new(id: u64, entry: impl Into<String>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id,
            entry: entry.into(),
            resources: ResourceContainer::new(),
            states: Mutex::new(HashMap::new()),
            live: AtomicUsize::new(0),
            failure: Mutex::new(None),
            cleanup: Mutex::new(Vec::new()),
            done,
        }
    }

    /// State object of `namespace`, created on first access.
    ///
    /// A namespace without a state factory uses its closest base's factory.
    pub(crate) fn state_of(&self, floor: &FloorShared, namespace: usize) -> Option<StateCell> {
        let mut current = Some(namespace);
        let factory = loop {
            let ns = &floor.descriptors.namespaces[current?];
            if let Some(factory) = &ns.state {
                break factory;
            }
            current = ns.base;
        };
        let cell = lock(&self.states)
            .entry(namespace)
            .or_insert_with(|| Arc::new(Mutex::new(factory())))
            .clone();
        Some(cell)
    }

    /// Keeps the first unhandled escalation.
    pub(crate) fn record_failure(&self, escalation: Escalation) {
        lock(&self.failure).get_or_insert(escalation);
    }

    pub(crate) fn failure(&self) -> Option<Escalation> {
        lock(&self.failure).clone()
    }

    pub(crate) fn cleanup(&self) -> Vec<Escalation> {
        lock(&self.cleanup).clone()
    }

    /// Records recycle failures and publishes one event each.
    pub(crate) fn absorb(&self, floor: &FloorShared, cleanup: CleanupEscalations) {
        if cleanup.is_empty() {
            return;
        }
        for escalation in cleanup.iter() {
            floor.publish(
                Event::new(EventKind::CleanupEscalation)
                    .with_process(self.id)
                    .with_reason(escalation.to_string()),
            );
        }
        lock(&self.cleanup).extend(cleanup.into_vec());
    }

    pub(crate) fn thread_started(&self) {
        self.live.fetch_add(1, Ordering::AcqRel);
    }

    /// Completes the process when the last thread is gone.
    pub(crate) fn thread_finished(&self, floor: &FloorShared) {
        if self.live.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut cleanup = CleanupEscalations::new();
        let recycled = self.resources.recycle(&mut cleanup);
        floor.publish(
            Event::new(EventKind::ResourcesRecycled)
                .with_process(self.id)
                .with_reason(format!("process: {recycled}")),
        );
        self.absorb(floor, cleanup);

        let event = match self.failure() {
            Some(escalation) => Event::new(EventKind::ProcessFailed).with_reason(escalation.to_string()),
            None => Event::new(EventKind::ProcessCompleted),
        };
        floor.publish(event.with_process(self.id).with_subject(self.entry.as_str()));
        floor.process_done(self.id);
        self.done.send_replace(true);
    }

    pub(crate) fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    pub(crate) fn done(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }
}
