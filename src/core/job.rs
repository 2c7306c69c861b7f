use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::core::escalate::Level;
use crate::core::thread::ParkedJob;
use crate::escalation::Escalation;
use crate::monitor::AssetKey;
use crate::payload::{Payload, payload};
use crate::resources::ResourceContainer;

/// Stage of one job.
///
/// ```text
/// Pending → LoadingResources → Governing → PreDuties → Executing
///         → PostDuties → AwaitingFlows → Completed
/// ```
/// Any stage before `Completed` may escalate instead of advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Pending,
    LoadingResources,
    Governing,
    PreDuties,
    Executing,
    PostDuties,
    AwaitingFlows,
    Completed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Pending => "pending",
            JobStage::LoadingResources => "loading_resources",
            JobStage::Governing => "governing",
            JobStage::PreDuties => "pre_duties",
            JobStage::Executing => "executing",
            JobStage::PostDuties => "post_duties",
            JobStage::AwaitingFlows => "awaiting_flows",
            JobStage::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the `Governing` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GovernStep {
    /// Enforce an active governance the function does not need.
    Enforce(usize),
    Activate(usize),
    /// Attach a governed resource's extension.
    Attach { governance: usize, resource: usize },
}

impl GovernStep {
    pub(crate) fn governance(&self) -> usize {
        match *self {
            GovernStep::Enforce(g) | GovernStep::Activate(g) => g,
            GovernStep::Attach { governance, .. } => governance,
        }
    }
}

/// One function invocation in flight.
pub(crate) struct Job {
    pub(crate) function: usize,
    pub(crate) argument: Option<Payload>,
    /// Set when the job handles an escalation.
    pub(crate) escalation: Option<Escalation>,
    pub(crate) stage: JobStage,
    /// Progress within the current stage.
    pub(crate) cursor: usize,
    pub(crate) plan: VecDeque<GovernStep>,
    /// Resource objects by binding index.
    pub(crate) objects: HashMap<usize, Payload>,
    /// Function-scoped resources.
    pub(crate) container: ResourceContainer<ParkedJob>,
    pub(crate) result: Option<Payload>,
    /// Sequential flows to run before `next`, in instigation order.
    pub(crate) sequential: Vec<(usize, Option<Payload>)>,
    /// Asynchronous completions to await.
    pub(crate) awaiting: VecDeque<(usize, AssetKey)>,
    /// Where escalations raised by this job start looking for a handler.
    pub(crate) outward: Level,
    /// Number of enclosing escalation handlers.
    pub(crate) depth: usize,
}

impl Job {
    pub(crate) fn new(function: usize, argument: Option<Payload>, depth: usize) -> Self {
        Self {
            function,
            argument,
            escalation: None,
            stage: JobStage::Pending,
            cursor: 0,
            plan: VecDeque::new(),
            objects: HashMap::new(),
            container: ResourceContainer::new(),
            result: None,
            sequential: Vec::new(),
            awaiting: VecDeque::new(),
            outward: Level::Function,
            depth,
        }
    }

    /// Handler job: the escalation is both its argument and its context.
    pub(crate) fn handler(function: usize, escalation: Escalation, outward: Level, depth: usize) -> Self {
        Self {
            argument: Some(payload(escalation.clone())),
            escalation: Some(escalation),
            outward,
            ..Self::new(function, None, depth)
        }
    }

    pub(crate) fn advance(&mut self, stage: JobStage) {
        self.stage = stage;
        self.cursor = 0;
    }
}
