//! # Thread states and the stage machine that drives them.
//!
//! A [`ThreadState`] is one logical sequential execution context. It is an
//! owned value that is always in exactly one place: running on a team
//! worker, parked on a readiness monitor inside a [`ParkedJob`], or gone.
//! Nothing else holds it, so the job stack and the governance stack need no
//! locks.
//!
//! ```text
//!              ┌────────────── hop(team) ◄──────────────┐
//!              ▼                                        │
//! drive ──► step ──► Continue ─────────────────────────►│ (same team)
//!              ├──► Park(monitor, key) ──► register_waiter ──► resume ──► drive
//!              ├──► Escalate ──► escalation procedure ──► handler job / fail
//!              └──► Finished ──► recycle thread scope, settle completion
//! ```
//!
//! Each stage runs on the team that owns it: resource loading and the body
//! on the function's team, governance steps on the governance's team, duties
//! on the administration's team. Changing team re-queues the thread, and so
//! does resuming: a parked thread always continues on the team it parked on,
//! never on the thread that settled the asset.

use std::collections::{HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use crate::core::context::{DutyContext, FunctionContext, Instigation};
use crate::core::floor::FloorShared;
use crate::core::job::{GovernStep, Job, JobStage};
use crate::core::process::ProcessState;
use crate::error::TeamError;
use crate::escalation::{CauseType, Escalation};
use crate::events::{Event, EventKind};
use crate::governance::ActiveGovernances;
use crate::issues::AssetType;
use crate::meta::{FunctionMeta, Strategy};
use crate::monitor::{AssetKey, Readiness, ReadinessMonitor, Registration, Waiter};
use crate::payload::Payload;
use crate::resources::{Activation, CleanupEscalations, ResourceContainer, ResourceSlot, Scope};
use crate::sync::lock;
use crate::teams::Work;

pub(crate) type Monitor = ReadinessMonitor<ParkedJob>;

/// What the driver does after one step.
enum Step {
    Continue,
    Hop(usize),
    Park { monitor: usize, key: AssetKey },
    Escalate(Escalation),
    Finished,
}

pub(crate) struct ThreadState {
    pub(crate) process: Arc<ProcessState>,
    pub(crate) stack: Vec<Job>,
    pub(crate) governances: ActiveGovernances,
    /// `(governance, resource)` pairs attached for non-function scopes.
    pub(crate) attached: HashSet<(usize, usize)>,
    /// Thread-scoped resources.
    pub(crate) container: ResourceContainer<ParkedJob>,
    /// Team whose worker currently runs the thread.
    pub(crate) team: Option<usize>,
    /// Failure delivered while parked or hopping.
    pub(crate) resumed: Option<Escalation>,
    /// Asset settled when the thread ends (asynchronous flows).
    pub(crate) completion: Option<(usize, AssetKey)>,
    /// Set once the thread ended through the default handler.
    pub(crate) failure: Option<Escalation>,
}

/// A thread parked on a readiness monitor.
pub(crate) struct ParkedJob {
    floor: Arc<FloorShared>,
    thread: Box<ThreadState>,
}

impl Waiter for ParkedJob {
    fn resume(self, readiness: Readiness) {
        let ParkedJob { floor, thread } = self;
        let mut thread = *thread;
        if let Some(escalation) = readiness.escalation() {
            thread.resumed = Some(escalation.clone());
        }
        floor.publish(thread.job_event(&floor, EventKind::JobResumed));
        match thread.team.take() {
            Some(team) => hop(&floor, thread, team),
            None => drive(&floor, thread),
        }
    }
}

/// Starts a new thread of `process` with one job.
pub(crate) fn spawn_thread(
    floor: &Arc<FloorShared>,
    process: &Arc<ProcessState>,
    function: usize,
    argument: Option<Payload>,
    completion: Option<(usize, AssetKey)>,
) {
    process.thread_started();
    let thread = ThreadState {
        process: Arc::clone(process),
        stack: vec![Job::new(function, argument, 0)],
        governances: ActiveGovernances::new(),
        attached: HashSet::new(),
        container: ResourceContainer::new(),
        team: None,
        resumed: None,
        completion,
        failure: None,
    };
    drive(floor, thread);
}

/// Runs `thread` until it parks, changes team or finishes.
pub(crate) fn drive(floor: &Arc<FloorShared>, mut thread: ThreadState) {
    loop {
        let step = match thread.resumed.take() {
            Some(escalation) => Step::Escalate(escalation),
            None => thread.step(floor),
        };
        match step {
            Step::Continue => {}
            Step::Hop(team) => {
                hop(floor, thread, team);
                return;
            }
            Step::Park { monitor, key } => {
                let parked_event = thread.job_event(floor, EventKind::JobParked);
                let monitor = &floor.monitors[monitor];
                let parked_event = parked_event.with_reason(monitor.name());
                let waiter = ParkedJob {
                    floor: Arc::clone(floor),
                    thread: Box::new(thread),
                };
                match monitor.register_waiter(key, waiter) {
                    Registration::Parked => {
                        floor.publish(parked_event);
                        return;
                    }
                    Registration::Settled(waiter, readiness) => {
                        thread = *waiter.thread;
                        if let Some(escalation) = readiness.escalation() {
                            thread.resumed = Some(escalation.clone());
                        }
                    }
                }
            }
            Step::Escalate(escalation) => thread.escalate(floor, escalation),
            Step::Finished => {
                thread.finish(floor);
                return;
            }
        }
    }
}

/// Re-queues `thread` on `team`. A refused assignment escalates with
/// `TeamUnavailable` on the current worker instead of dropping the thread.
fn hop(floor: &Arc<FloorShared>, thread: ThreadState, team: usize) {
    let baton = Arc::new(Mutex::new(Some(thread)));
    let carried = Arc::clone(&baton);
    let target = Arc::clone(floor);
    let work: Work = Box::new(move || {
        let taken = lock(&carried).take();
        if let Some(mut thread) = taken {
            thread.team = Some(team);
            drive(&target, thread);
        }
    });

    let assigned = match floor.teams.get(team) {
        Some(t) => t.assign(work),
        None => Err(TeamError::Stopped {
            team: format!("#{team}"),
        }),
    };
    if let Err(err) = assigned {
        let taken = lock(&baton).take();
        if let Some(mut thread) = taken {
            thread.resumed = Some(
                Escalation::new(CauseType::team_unavailable(), err.to_string()).with_source(err),
            );
            drive(floor, thread);
        }
    }
}

/// Runs user code, turning a panic into an escalation.
fn guarded<T>(f: impl FnOnce() -> Result<T, Escalation>) -> Result<T, Escalation> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| Err(Escalation::from_panic(&*panic)))
}

/// The container holding resources of `scope` for this job.
fn container_for<'c>(
    floor: &'c FloorShared,
    process: &'c ProcessState,
    thread: &'c ResourceContainer<ParkedJob>,
    job: &'c ResourceContainer<ParkedJob>,
    scope: Scope,
) -> &'c ResourceContainer<ParkedJob> {
    match scope {
        Scope::Function => job,
        Scope::Thread => thread,
        Scope::Namespace | Scope::Process => &process.resources,
        Scope::Floor => &floor.floor_resources,
    }
}

/// Extension `name` of an activated resource, or its object if `name` is empty.
fn exposed(slot: &ResourceSlot<ParkedJob>, name: &str) -> Option<Payload> {
    if name.is_empty() {
        slot.object()
    } else {
        slot.extension(name)
    }
}

impl ThreadState {
    pub(crate) fn job_event(&self, floor: &FloorShared, kind: EventKind) -> Event {
        let event = Event::new(kind).with_process(self.process.id);
        match self.stack.last() {
            Some(job) => event.with_subject(floor.descriptors.functions[job.function].qualified.as_str()),
            None => event,
        }
    }

    fn step(&mut self, floor: &Arc<FloorShared>) -> Step {
        let Some(stage) = self.stack.last().map(|job| job.stage) else {
            return self.wind_down(floor);
        };
        match stage {
            JobStage::Pending => self.start(floor),
            JobStage::LoadingResources => self.load_resources(floor),
            JobStage::Governing => self.govern(floor),
            JobStage::PreDuties => self.duties(floor, false),
            JobStage::Executing => self.execute(floor),
            JobStage::PostDuties => self.duties(floor, true),
            JobStage::AwaitingFlows => self.await_flows(),
            JobStage::Completed => self.complete(floor),
        }
    }

    fn start(&mut self, floor: &FloorShared) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        let team = floor.descriptors.functions[job.function].team;
        if self.team != Some(team) {
            return Step::Hop(team);
        }
        job.advance(JobStage::LoadingResources);
        floor.publish(self.job_event(floor, EventKind::JobStarting));
        Step::Continue
    }

    /// Activates the function's required resources, dependencies first.
    fn load_resources(&mut self, floor: &FloorShared) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        let meta = &floor.descriptors.functions[job.function];
        if self.team != Some(meta.team) {
            return Step::Hop(meta.team);
        }

        while let Some(&r) = meta.required.get(job.cursor) {
            let binding = &floor.descriptors.resources[r];
            let container = container_for(floor, &self.process, &self.container, &job.container, binding.scope);
            let timeout = binding.timeout.or(floor.cfg.default_asset_timeout());
            let slot = container.slot(r, || {
                ResourceSlot::new(binding.name.as_str(), Arc::clone(&floor.monitors[binding.monitor]), timeout)
            });
            let Some(slot) = slot else {
                return Step::Escalate(Escalation::new(
                    CauseType::resource_failure(),
                    format!("{} scope of '{}' already recycled", binding.scope, binding.name),
                ));
            };

            let mut dependencies = Vec::with_capacity(binding.dependencies.len());
            for d in &binding.dependencies {
                let Some(object) = job.objects.get(d) else {
                    return Step::Escalate(Escalation::unresolved(format!(
                        "dependency '{}' of '{}' is not active",
                        floor.descriptors.resources[*d].name, binding.name
                    )));
                };
                dependencies.push(Arc::clone(object));
            }

            match slot.activate(binding.factory(), &dependencies) {
                Activation::Ready(object) => {
                    job.objects.insert(r, object);
                    job.cursor += 1;
                }
                Activation::Pending(key) => {
                    return Step::Park {
                        monitor: binding.monitor,
                        key,
                    };
                }
                Activation::Failed(escalation) => return Step::Escalate(escalation),
            }
        }

        job.plan = governance_plan(floor, meta, &self.governances);
        job.advance(JobStage::Governing);
        Step::Continue
    }

    fn govern(&mut self, floor: &FloorShared) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        while let Some(&step) = job.plan.front() {
            let binding = &floor.descriptors.governances[step.governance()];
            if self.team != Some(binding.team) {
                return Step::Hop(binding.team);
            }
            job.plan.pop_front();

            match step {
                GovernStep::Enforce(g) => {
                    self.attached.retain(|(governance, _)| *governance != g);
                    let governances = &mut self.governances;
                    let outcome = guarded(|| match governances.enforce(g) {
                        Some((_, outcome)) => outcome,
                        None => Ok(()),
                    });
                    floor.publish(
                        Event::new(EventKind::GovernanceEnforced)
                            .with_process(self.process.id)
                            .with_subject(binding.name.clone()),
                    );
                    if let Err(escalation) = outcome {
                        return Step::Escalate(escalation);
                    }
                }
                GovernStep::Activate(g) => {
                    let governances = &mut self.governances;
                    let activated = guarded(|| {
                        Ok(governances.activate(g, Arc::clone(&binding.name), binding.factory.as_ref()))
                    });
                    match activated {
                        Ok(true) => floor.publish(
                            Event::new(EventKind::GovernanceActivated)
                                .with_process(self.process.id)
                                .with_subject(binding.name.clone()),
                        ),
                        Ok(false) => {}
                        Err(escalation) => return Step::Escalate(escalation),
                    }
                }
                GovernStep::Attach { governance, resource } => {
                    let scope = floor.descriptors.resources[resource].scope;
                    if scope != Scope::Function && !self.attached.insert((governance, resource)) {
                        continue;
                    }
                    let container = container_for(floor, &self.process, &self.container, &job.container, scope);
                    let extension = container
                        .get(resource)
                        .and_then(|slot| exposed(&slot, &binding.extension));
                    let Some(extension) = extension else {
                        return Step::Escalate(Escalation::new(
                            CauseType::resource_failure(),
                            format!(
                                "'{}' exposes no extension '{}' to '{}'",
                                floor.descriptors.resources[resource].name, binding.extension, binding.name
                            ),
                        ));
                    };
                    let governances = &mut self.governances;
                    if let Err(escalation) = guarded(|| governances.attach(governance, extension)) {
                        return Step::Escalate(escalation);
                    }
                }
            }
        }
        job.advance(JobStage::PreDuties);
        Step::Continue
    }

    fn duties(&mut self, floor: &Arc<FloorShared>, post: bool) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        let meta = &floor.descriptors.functions[job.function];
        let duties = if post { &meta.post_duties } else { &meta.pre_duties };
        let Some(duty_ref) = duties.get(job.cursor) else {
            job.advance(if post {
                JobStage::AwaitingFlows
            } else {
                JobStage::Executing
            });
            return Step::Continue;
        };
        let administration = &floor.descriptors.administrations[duty_ref.administration];
        if self.team != Some(administration.team) {
            return Step::Hop(administration.team);
        }
        let duty = &administration.duties[duty_ref.duty];

        let extensions = administration
            .resources
            .iter()
            .filter(|r| job.objects.contains_key(*r))
            .filter_map(|&r| {
                let scope = floor.descriptors.resources[r].scope;
                let container = container_for(floor, &self.process, &self.container, &job.container, scope);
                container.get(r).and_then(|slot| exposed(&slot, &administration.extension))
            })
            .collect();
        let mut ctx = DutyContext {
            floor,
            process: self.process.id,
            administration,
            duty,
            function: meta,
            extensions,
            instigated: Vec::new(),
        };
        let outcome = guarded(|| administration.provider.administer(&duty.name, &mut ctx));
        let instigated = ctx.instigated;
        job.cursor += 1;

        match outcome {
            Ok(()) => {
                self.launch(floor, instigated, false);
                Step::Continue
            }
            Err(escalation) => {
                instigated.into_iter().for_each(|i| i.abandon(floor));
                Step::Escalate(escalation)
            }
        }
    }

    fn execute(&mut self, floor: &Arc<FloorShared>) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        let meta = &floor.descriptors.functions[job.function];
        if self.team != Some(meta.team) {
            return Step::Hop(meta.team);
        }

        let body = Arc::clone(&meta.body);
        let mut ctx = FunctionContext {
            floor,
            process: &self.process,
            meta,
            argument: job.argument.clone(),
            escalation: job.escalation.as_ref(),
            objects: &job.objects,
            instigated: Vec::new(),
        };
        let outcome = guarded(|| body(&mut ctx));
        let FunctionContext { instigated, .. } = ctx;

        match outcome {
            Ok(result) => {
                job.result = result;
                job.advance(JobStage::PostDuties);
                self.launch(floor, instigated, true);
                Step::Continue
            }
            Err(escalation) => {
                instigated.into_iter().for_each(|i| i.abandon(floor));
                Step::Escalate(escalation)
            }
        }
    }

    fn await_flows(&mut self) -> Step {
        let Some(job) = self.stack.last_mut() else {
            return Step::Finished;
        };
        match job.awaiting.pop_front() {
            Some((monitor, key)) => Step::Park { monitor, key },
            None => {
                job.advance(JobStage::Completed);
                Step::Continue
            }
        }
    }

    /// Pops the job and queues `next` below its sequential flows.
    fn complete(&mut self, floor: &FloorShared) -> Step {
        let Some(top) = self.stack.last() else {
            return Step::Finished;
        };
        let meta = &floor.descriptors.functions[top.function];
        if let (Some(name), None) = (&meta.next_name, meta.next) {
            return Step::Escalate(Escalation::unresolved(format!(
                "next '{name}' of '{}' is not bound",
                meta.qualified
            )));
        }
        let completed = self.job_event(floor, EventKind::JobCompleted);
        let Some(job) = self.stack.pop() else {
            return Step::Finished;
        };

        let mut cleanup = CleanupEscalations::new();
        job.container.recycle(&mut cleanup);
        self.process.absorb(floor, cleanup);
        floor.publish(completed);

        if let Some(next) = meta.next {
            self.stack.push(Job::new(next, job.result.clone(), job.depth));
        }
        for (target, argument) in job.sequential.into_iter().rev() {
            self.stack.push(Job::new(target, argument, job.depth));
        }
        Step::Continue
    }

    /// Launches what a body or duty instigated.
    ///
    /// Sequential flows of a body wait for the job to complete; sequential
    /// duty flows run right away, above the administered job.
    fn launch(&mut self, floor: &Arc<FloorShared>, instigated: Vec<Instigation>, defer_sequential: bool) {
        let depth = self.stack.last().map_or(0, |job| job.depth);
        let mut immediate = Vec::new();
        for instigation in instigated {
            match instigation {
                Instigation::Manual { completion } => {
                    if let Some(job) = self.stack.last_mut() {
                        job.awaiting.push_back(completion);
                    }
                }
                Instigation::Flow {
                    target,
                    strategy: Strategy::Sequential,
                    argument,
                    ..
                } => {
                    if !defer_sequential {
                        immediate.push(Job::new(target, argument, depth));
                    } else if let Some(job) = self.stack.last_mut() {
                        job.sequential.push((target, argument));
                    }
                }
                Instigation::Flow {
                    target,
                    argument,
                    completion,
                    ..
                } => {
                    if let (Some(job), Some(completion)) = (self.stack.last_mut(), completion) {
                        job.awaiting.push_back(completion);
                    }
                    spawn_thread(floor, &self.process, target, argument, completion);
                }
            }
        }
        self.stack.extend(immediate.into_iter().rev());
    }

    /// With no job left, enforces the governances still active, innermost
    /// first; disregarded ones are already gone.
    fn wind_down(&mut self, floor: &FloorShared) -> Step {
        let Some(g) = self.governances.innermost_first().next() else {
            return Step::Finished;
        };
        let binding = &floor.descriptors.governances[g];
        if self.team != Some(binding.team) {
            return Step::Hop(binding.team);
        }
        self.attached.retain(|(governance, _)| *governance != g);
        let governances = &mut self.governances;
        let outcome = guarded(|| match governances.enforce(g) {
            Some((_, outcome)) => outcome,
            None => Ok(()),
        });
        floor.publish(
            Event::new(EventKind::GovernanceEnforced)
                .with_process(self.process.id)
                .with_subject(binding.name.clone()),
        );
        match outcome {
            Ok(()) => Step::Continue,
            Err(escalation) => Step::Escalate(escalation),
        }
    }

    /// Ends the thread: duty-cycle check, thread-scope recycling, completion
    /// signal, process bookkeeping.
    fn finish(mut self, floor: &FloorShared) {
        if let Err(err) = self.governances.complete() {
            floor
                .issues
                .add_issue(AssetType::Process, &self.process.entry, &err.to_string(), Some(&err));
            self.disregard(floor, 0);
        }

        let mut cleanup = CleanupEscalations::new();
        let recycled = self.container.recycle(&mut cleanup);
        if recycled > 0 {
            floor.publish(
                Event::new(EventKind::ResourcesRecycled)
                    .with_process(self.process.id)
                    .with_reason(format!("thread: {recycled}")),
            );
        }
        self.process.absorb(floor, cleanup);

        if let Some((monitor, key)) = self.completion {
            let monitor = &floor.monitors[monitor];
            match &self.failure {
                Some(escalation) => monitor.fail(key, escalation.clone()),
                None => monitor.notify_ready(key),
            };
        }
        self.process.thread_finished(floor);
    }

    /// Disregards the governances from stack position `from` inward and
    /// detaches their resources.
    pub(crate) fn disregard(&mut self, floor: &FloorShared, from: usize) {
        let mut cleanup = CleanupEscalations::new();
        let names = self.governances.disregard_from(from, &mut cleanup);
        let governances = &self.governances;
        self.attached.retain(|(governance, _)| governances.is_active(*governance));
        for name in names {
            floor.publish(
                Event::new(EventKind::GovernanceDisregarded)
                    .with_process(self.process.id)
                    .with_subject(name),
            );
        }
        self.process.absorb(floor, cleanup);
    }
}

/// Governance steps of a function entering `Governing`.
fn governance_plan(
    floor: &FloorShared,
    meta: &FunctionMeta,
    active: &ActiveGovernances,
) -> VecDeque<GovernStep> {
    let needed = &meta.governances;
    let mut plan: VecDeque<GovernStep> = active
        .innermost_first()
        .filter(|g| !needed.contains(g))
        .map(GovernStep::Enforce)
        .collect();
    plan.extend(
        needed
            .iter()
            .filter(|g| !active.is_active(**g))
            .map(|&g| GovernStep::Activate(g)),
    );
    for &resource in &meta.required {
        for &governance in &floor.descriptors.resources[resource].governed_by {
            if needed.contains(&governance) {
                plan.push_back(GovernStep::Attach { governance, resource });
            }
        }
    }
    plan
}
