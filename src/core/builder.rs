use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::bind::bind;
use crate::config::FloorConfig;
use crate::core::floor::{EscalationHandler, FloorShared, LogEscalations, ProcessFloor};
use crate::core::thread::Monitor;
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::issues::{BusIssues, IssueCollector, IssueFanout, IssueSink};
use crate::model::FloorModel;
use crate::resources::ResourceContainer;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::teams::{Team, TeamRegistry};

/// Builder for a [`ProcessFloor`].
pub struct FloorBuilder {
    cfg: FloorConfig,
    teams: TeamRegistry,
    subscribers: Vec<Arc<dyn Subscribe>>,
    issue_sink: Option<Arc<dyn IssueSink>>,
    handler: Arc<dyn EscalationHandler>,
}

impl FloorBuilder {
    pub fn new(cfg: FloorConfig) -> Self {
        Self {
            cfg,
            teams: TeamRegistry::new(),
            subscribers: Vec::new(),
            issue_sink: None,
            handler: Arc::new(LogEscalations),
        }
    }

    /// Registers `team` under `name`; models refer to teams by name.
    pub fn with_team(mut self, name: impl Into<String>, team: Arc<dyn Team>) -> Self {
        self.teams.register(name, team);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers see bind issues too: they are attached before binding.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a sink receiving every bind issue, next to the floor's own
    /// collector and the bus.
    pub fn with_issue_sink(mut self, sink: Arc<dyn IssueSink>) -> Self {
        self.issue_sink = Some(sink);
        self
    }

    /// Replaces the default handler for unmatched escalations, which logs
    /// them.
    pub fn with_escalation_handler(mut self, handler: Arc<dyn EscalationHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Binds `model` and starts the floor.
    ///
    /// Must be called within a tokio runtime: the event listener, the
    /// subscriber workers and the timeout ticker are tokio tasks.
    ///
    /// Offending model items are skipped and reported; the build fails only
    /// if no function could be bound at all.
    pub fn build(self, model: &FloorModel) -> Result<ProcessFloor, RuntimeError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let token = CancellationToken::new();
        let listener = spawn_listener(bus.subscribe(), Arc::clone(&subs), token.clone());

        let collector = Arc::new(IssueCollector::new());
        let mut sinks: Vec<Arc<dyn IssueSink>> = vec![collector.clone(), Arc::new(BusIssues::new(bus.clone()))];
        sinks.extend(self.issue_sink);
        let issues: Arc<dyn IssueSink> = Arc::new(IssueFanout::new(sinks));

        let Some(descriptors) = bind(model, &self.teams, issues.as_ref()) else {
            token.cancel();
            return Err(RuntimeError::NothingBound {
                issues: collector.len(),
            });
        };

        let period = self.cfg.monitor_interval_clamped();
        let monitors = descriptors
            .monitors
            .iter()
            .map(|name| Arc::new(Monitor::new(name.as_str())))
            .collect();
        let (idle, _) = watch::channel(0);
        let shared = Arc::new(FloorShared {
            cfg: self.cfg,
            descriptors,
            teams: self.teams,
            monitors,
            floor_resources: ResourceContainer::new(),
            bus,
            issues,
            handler: self.handler,
            next_process: AtomicU64::new(1),
            in_flight: Mutex::new(BTreeSet::new()),
            idle,
            closed: AtomicBool::new(false),
            floor_cleanup: Mutex::new(Vec::new()),
        });
        spawn_ticker(Arc::downgrade(&shared), period, token.clone());

        Ok(ProcessFloor {
            shared,
            subs: Mutex::new(Some(subs)),
            listener: Mutex::new(Some(listener)),
            token,
            issues: collector,
        })
    }
}

/// Forwards bus events to the subscriber set until cancelled, then drains
/// what is already queued.
fn spawn_listener(
    mut rx: broadcast::Receiver<Event>,
    subs: Arc<SubscriberSet>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(&ev),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    })
}

/// Checks monitor deadlines every `monitor_interval` while the floor lives.
fn spawn_ticker(floor: Weak<FloorShared>, period: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(floor) = floor.upgrade() else { break };
                    floor.check_timeouts();
                }
            }
        }
    });
}
