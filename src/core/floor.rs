//! # Process floor: the running kernel.
//!
//! [`ProcessFloor`] owns the bound descriptors, the teams, one readiness
//! monitor per declared asset group, the floor-scoped resources and the event
//! bus. Processes are started with [`ProcessFloor::invoke`] and run on the
//! teams; the floor itself never runs user code on the caller's task, except
//! through a [`PassiveTeam`](crate::teams::PassiveTeam).
//!
//! ## Shutdown
//! ```text
//! shutdown()
//!   ├─► closed = true              → invoke() returns FloorClosed
//!   ├─► publish ShutdownRequested
//!   ├─► wait in-flight == 0 within cfg.grace (timeouts keep being checked)
//!   │      ├─ Ok  → AllStoppedWithin
//!   │      └─ Err → GraceExceeded { stuck }
//!   ├─► recycle floor resources   → ResourcesRecycled / CleanupEscalation
//!   ├─► stop the timeout ticker and the event listener
//!   └─► drain and release teams
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::FloorConfig;
use crate::core::handle::ProcessHandle;
use crate::core::process::ProcessState;
use crate::core::signals::shutdown_signal;
use crate::core::thread::{Monitor, ParkedJob, spawn_thread};
use crate::error::RuntimeError;
use crate::escalation::Escalation;
use crate::events::{Bus, Event, EventKind};
use crate::issues::{IssueCollector, IssueSink};
use crate::meta::Descriptors;
use crate::payload::Payload;
use crate::resources::{CleanupEscalations, ResourceContainer};
use crate::subscribers::SubscriberSet;
use crate::sync::lock;
use crate::teams::TeamRegistry;

/// Receives escalations no handler matched.
///
/// Called on a worker of the team running the thread, after the thread's
/// governances were disregarded and before the process records the failure.
/// Escalations settled by a readiness monitor (timeouts, failed flows) are
/// first re-queued onto the team the job parked on. A panic here is kept
/// as a cleanup escalation of the process.
pub trait EscalationHandler: Send + Sync + 'static {
    fn unhandled(&self, process: u64, escalation: &Escalation);
}

/// Default handler: logs the escalation through `tracing`.
pub struct LogEscalations;

impl EscalationHandler for LogEscalations {
    fn unhandled(&self, process: u64, escalation: &Escalation) {
        tracing::error!(
            process,
            cause = escalation.cause().name(),
            label = escalation.as_label(),
            "unhandled escalation: {}",
            escalation.message()
        );
    }
}

/// State shared by every thread of every process.
pub(crate) struct FloorShared {
    pub(crate) cfg: FloorConfig,
    pub(crate) descriptors: Descriptors,
    pub(crate) teams: TeamRegistry,
    pub(crate) monitors: Vec<Arc<Monitor>>,
    pub(crate) floor_resources: ResourceContainer<ParkedJob>,
    pub(crate) bus: Bus,
    pub(crate) issues: Arc<dyn IssueSink>,
    pub(crate) handler: Arc<dyn EscalationHandler>,
    pub(crate) next_process: AtomicU64,
    pub(crate) in_flight: Mutex<BTreeSet<u64>>,
    pub(crate) idle: watch::Sender<usize>,
    pub(crate) closed: AtomicBool,
    pub(crate) floor_cleanup: Mutex<Vec<Escalation>>,
}

impl FloorShared {
    pub(crate) fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Registers a new process id unless the floor is closed.
    fn admit(&self) -> Result<u64, RuntimeError> {
        let mut in_flight = lock(&self.in_flight);
        if self.closed.load(Ordering::Acquire) {
            return Err(RuntimeError::FloorClosed);
        }
        let id = self.next_process.fetch_add(1, Ordering::Relaxed);
        in_flight.insert(id);
        self.idle.send_replace(in_flight.len());
        Ok(id)
    }

    pub(crate) fn process_done(&self, id: u64) {
        let mut in_flight = lock(&self.in_flight);
        in_flight.remove(&id);
        self.idle.send_replace(in_flight.len());
    }

    /// Times out every overdue asset; parked jobs resume with `Timeout`.
    pub(crate) fn check_timeouts(&self) {
        let now = Instant::now();
        for monitor in &self.monitors {
            for expired in monitor.check_timeouts(now) {
                self.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_subject(monitor.name())
                        .with_reason(format!("asset {}", expired.key.raw()))
                        .with_timeout(expired.timeout),
                );
            }
        }
    }
}

/// The running kernel. Build one with [`FloorBuilder`](crate::FloorBuilder).
pub struct ProcessFloor {
    pub(crate) shared: Arc<FloorShared>,
    pub(crate) subs: Mutex<Option<Arc<SubscriberSet>>>,
    pub(crate) listener: Mutex<Option<JoinHandle<()>>>,
    pub(crate) token: CancellationToken,
    pub(crate) issues: Arc<IssueCollector>,
}

impl ProcessFloor {
    /// Starts a process at `namespace.function` with `argument`.
    ///
    /// The returned handle completes once every thread of the process has
    /// finished; the call itself does not wait.
    pub fn invoke(
        &self,
        namespace: &str,
        function: &str,
        argument: Option<Payload>,
    ) -> Result<ProcessHandle, RuntimeError> {
        let descriptors = &self.shared.descriptors;
        let ns = descriptors
            .namespace(namespace)
            .ok_or_else(|| RuntimeError::UnknownNamespace {
                namespace: namespace.to_string(),
            })?;
        let index = ns
            .function_index(function)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                namespace: namespace.to_string(),
                function: function.to_string(),
            })?;

        let id = self.shared.admit()?;
        let entry = &descriptors.functions[index].qualified;
        let process = Arc::new(ProcessState::new(id, entry.as_str()));
        self.shared.publish(
            Event::new(EventKind::ProcessStarted)
                .with_process(id)
                .with_subject(entry.as_str()),
        );
        let handle = ProcessHandle::new(Arc::clone(&process));
        spawn_thread(&self.shared, &process, index, argument, None);
        Ok(handle)
    }

    /// Stops accepting processes, waits for in-flight ones within
    /// [`FloorConfig::grace`], then recycles floor resources and releases
    /// the teams.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] with the ids of processes
    /// still running when the grace period ran out. Teardown completes
    /// either way; calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        {
            let _in_flight = lock(&self.shared.in_flight);
            if self.shared.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }
        self.shared.publish(Event::new(EventKind::ShutdownRequested));
        let outcome = self.wait_in_flight().await;
        self.recycle_floor();

        self.token.cancel();
        let listener = lock(&self.listener).take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
        let subs = lock(&self.subs).take();
        if let Some(subs) = subs.and_then(|s| Arc::try_unwrap(s).ok()) {
            subs.shutdown().await;
        }

        let shared = Arc::clone(&self.shared);
        if let Err(err) = tokio::task::spawn_blocking(move || shared.teams.shutdown_all()).await {
            tracing::warn!(error = %err, "team shutdown did not complete");
        }
        outcome
    }

    /// Waits for SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        match shutdown_signal().await {
            Ok(signal) => tracing::info!(signal, "shutdown signal received"),
            Err(err) => tracing::warn!(error = %err, "signal handlers unavailable; shutting down"),
        }
        self.shutdown().await
    }

    async fn wait_in_flight(&self) -> Result<(), RuntimeError> {
        let grace = self.shared.cfg.grace;
        let mut idle = self.shared.idle.subscribe();
        let within = tokio::time::timeout(grace, idle.wait_for(|n| *n == 0))
            .await
            .is_ok();
        if within {
            self.shared.publish(Event::new(EventKind::AllStoppedWithin));
            return Ok(());
        }
        let stuck: Vec<u64> = lock(&self.shared.in_flight).iter().copied().collect();
        self.shared.publish(
            Event::new(EventKind::GraceExceeded)
                .with_reason(format!("{} processes in flight", stuck.len()))
                .with_timeout(grace),
        );
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }

    fn recycle_floor(&self) {
        let mut cleanup = CleanupEscalations::new();
        let recycled = self.shared.floor_resources.recycle(&mut cleanup);
        self.shared.publish(
            Event::new(EventKind::ResourcesRecycled).with_reason(format!("floor: {recycled}")),
        );
        for escalation in cleanup.iter() {
            self.shared
                .publish(Event::new(EventKind::CleanupEscalation).with_reason(escalation.to_string()));
        }
        lock(&self.shared.floor_cleanup).extend(cleanup.into_vec());
    }

    pub fn descriptors(&self) -> &Descriptors {
        &self.shared.descriptors
    }

    /// Bus carrying every kernel event; subscribe to observe the floor.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }

    /// Issues reported while binding.
    pub fn issues(&self) -> &IssueCollector {
        &self.issues
    }

    /// Ids of processes not yet complete.
    pub fn in_flight(&self) -> Vec<u64> {
        lock(&self.shared.in_flight).iter().copied().collect()
    }

    /// Recycle failures of floor-scoped resources, available after shutdown.
    pub fn cleanup_escalations(&self) -> Vec<Escalation> {
        lock(&self.shared.floor_cleanup).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for ProcessFloor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
