use std::sync::Arc;
use std::time::Duration;

use crate::core::{FunctionBody, FunctionContext};
use crate::escalation::{CauseType, Escalation};
use crate::meta::Strategy;
use crate::model::EscalationModel;
use crate::payload::Payload;

/// One declared parameter of a function, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParameterModel {
    /// A managed resource, by name.
    Resource(String),
    /// The value passed by the predecessor (or the invocation argument).
    Argument,
    /// The function context itself.
    Context,
    /// A declared flow, by name.
    Flow(String),
}

/// A continuation from one function to another.
#[derive(Clone, Debug)]
pub struct FlowModel {
    pub(crate) name: String,
    pub(crate) target: String,
    pub(crate) strategy: Strategy,
    pub(crate) timeout: Option<Duration>,
    pub(crate) has_parameter: bool,
}

impl FlowModel {
    fn new(name: impl Into<String>, target: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            strategy,
            timeout: None,
            has_parameter: true,
        }
    }

    /// Runs `target` on the same thread before the function's own `next`.
    pub fn sequential(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Strategy::Sequential)
    }

    /// Runs `target` on a new thread; nobody waits for it.
    pub fn parallel(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Strategy::Parallel)
    }

    /// Runs `target` on a new thread; the instigating job waits for it
    /// before completing.
    pub fn asynchronous(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, Strategy::Asynchronous)
    }

    /// Readiness timeout for an asynchronous flow.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The flow carries no argument to its target.
    pub fn without_parameter(mut self) -> Self {
        self.has_parameter = false;
        self
    }
}

/// Declaration of one function.
#[derive(Clone, Default)]
pub struct FunctionModel {
    pub(crate) name: String,
    pub(crate) body: Option<FunctionBody>,
    pub(crate) team: Option<String>,
    pub(crate) parameters: Vec<ParameterModel>,
    pub(crate) flows: Vec<FlowModel>,
    pub(crate) next: Option<String>,
    pub(crate) escalations: Vec<EscalationModel>,
    pub(crate) pre_duties: Vec<(String, String)>,
    pub(crate) post_duties: Vec<(String, String)>,
    pub(crate) governances: Vec<String>,
    pub(crate) asynchronous_timeout: Option<Duration>,
}

impl FunctionModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The callable run in the `Executing` stage.
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut FunctionContext<'_>) -> Result<Option<Payload>, Escalation> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(f));
        self
    }

    /// Team the body runs on (defaults to the floor's default team).
    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(ParameterModel::Resource(name.into()));
        self
    }

    pub fn with_argument(mut self) -> Self {
        self.parameters.push(ParameterModel::Argument);
        self
    }

    pub fn with_context(mut self) -> Self {
        self.parameters.push(ParameterModel::Context);
        self
    }

    /// Exposes a declared flow as a positional flow parameter.
    pub fn with_flow_parameter(mut self, flow: impl Into<String>) -> Self {
        self.parameters.push(ParameterModel::Flow(flow.into()));
        self
    }

    pub fn flow(mut self, flow: FlowModel) -> Self {
        self.flows.push(flow);
        self
    }

    /// The function run after this one (and its sequential flows) completes.
    pub fn next(mut self, function: impl Into<String>) -> Self {
        self.next = Some(function.into());
        self
    }

    /// Adds an entry to the function's own escalation table.
    pub fn escalation(mut self, cause: CauseType, handler: impl Into<String>) -> Self {
        self.escalations.push(EscalationModel::new(cause, handler));
        self
    }

    pub fn pre_duty(mut self, administration: impl Into<String>, duty: impl Into<String>) -> Self {
        self.pre_duties.push((administration.into(), duty.into()));
        self
    }

    pub fn post_duty(mut self, administration: impl Into<String>, duty: impl Into<String>) -> Self {
        self.post_duties.push((administration.into(), duty.into()));
        self
    }

    /// Requires a governance even if no resource parameter is governed by it.
    pub fn governance(mut self, governance: impl Into<String>) -> Self {
        self.governances.push(governance.into());
        self
    }

    /// Timeout for flows created with `FunctionContext::asynchronous_flow`.
    pub fn asynchronous_timeout(mut self, timeout: Duration) -> Self {
        self.asynchronous_timeout = Some(timeout);
        self
    }
}
