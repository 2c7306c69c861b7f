//! Contexts handed to user code: function bodies and duties.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::floor::FloorShared;
use crate::core::process::ProcessState;
use crate::core::thread::Monitor;
use crate::escalation::Escalation;
use crate::meta::{AdministrationMeta, DutyMeta, FlowMeta, FunctionMeta, Strategy};
use crate::monitor::AssetKey;
use crate::payload::{Payload, downcast};
use crate::sync::lock;

/// Registered callable of a function.
///
/// Returns the value passed to the function's `next`, or an escalation.
pub type FunctionBody =
    Arc<dyn Fn(&mut FunctionContext<'_>) -> Result<Option<Payload>, Escalation> + Send + Sync>;

/// Continuation requested by user code, launched by the kernel once the
/// body or duty returns successfully.
pub(crate) enum Instigation {
    Flow {
        target: usize,
        strategy: Strategy,
        argument: Option<Payload>,
        completion: Option<(usize, AssetKey)>,
    },
    /// Completion signalled by user code through an [`AsynchronousHandle`].
    Manual { completion: (usize, AssetKey) },
}

impl Instigation {
    /// Forgets the readiness asset of an instigation that will never launch.
    pub(crate) fn abandon(self, floor: &FloorShared) {
        let completion = match self {
            Instigation::Flow { completion, .. } => completion,
            Instigation::Manual { completion } => Some(completion),
        };
        if let Some((monitor, key)) = completion {
            floor.monitors[monitor].remove_asset(key);
        }
    }
}

/// Completion handle of an asynchronous flow.
///
/// The instigating job waits for the asset behind this handle before it
/// completes. Flow handles are settled by the kernel when the flow's thread
/// ends; handles from [`FunctionContext::asynchronous_flow`] are settled by
/// user code.
#[derive(Clone)]
pub struct AsynchronousHandle {
    monitor: Arc<Monitor>,
    key: AssetKey,
}

impl AsynchronousHandle {
    pub(crate) fn new(monitor: Arc<Monitor>, key: AssetKey) -> Self {
        Self { monitor, key }
    }

    pub fn key(&self) -> AssetKey {
        self.key
    }

    /// Signals completion. Returns `false` if already settled.
    pub fn complete(&self) -> bool {
        self.monitor.notify_ready(self.key)
    }

    /// Signals failure; the waiting job escalates with `escalation`.
    pub fn fail(&self, escalation: Escalation) -> bool {
        self.monitor.fail(self.key, escalation)
    }

    /// `true` until the flow completes, fails or times out.
    pub fn is_pending(&self) -> bool {
        self.monitor.is_pending(self.key)
    }
}

impl std::fmt::Debug for AsynchronousHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsynchronousHandle")
            .field("monitor", &self.monitor.name())
            .field("key", &self.key)
            .finish()
    }
}

fn instigate(
    floor: &FloorShared,
    owner: &str,
    flow: &FlowMeta,
    argument: Option<Payload>,
    out: &mut Vec<Instigation>,
) -> Result<Option<AsynchronousHandle>, Escalation> {
    let Some(target) = flow.target else {
        return Err(Escalation::unresolved(format!(
            "flow '{}' of '{owner}' has no bound target '{}'",
            flow.name, flow.target_name
        )));
    };
    let argument = if flow.has_parameter { argument } else { None };

    let (completion, handle) = match (flow.strategy, flow.monitor) {
        (Strategy::Asynchronous, Some(m)) => {
            let monitor = &floor.monitors[m];
            let key = monitor.register_transient(flow.timeout);
            (Some((m, key)), Some(AsynchronousHandle::new(Arc::clone(monitor), key)))
        }
        (Strategy::Asynchronous, None) => {
            return Err(Escalation::unresolved(format!(
                "asynchronous flow '{}' of '{owner}' has no monitor",
                flow.name
            )));
        }
        _ => (None, None),
    };
    out.push(Instigation::Flow {
        target,
        strategy: flow.strategy,
        argument,
        completion,
    });
    Ok(handle)
}

/// What a function body sees while it runs.
pub struct FunctionContext<'a> {
    pub(crate) floor: &'a FloorShared,
    pub(crate) process: &'a Arc<ProcessState>,
    pub(crate) meta: &'a FunctionMeta,
    pub(crate) argument: Option<Payload>,
    pub(crate) escalation: Option<&'a Escalation>,
    pub(crate) objects: &'a HashMap<usize, Payload>,
    pub(crate) instigated: Vec<Instigation>,
}

impl FunctionContext<'_> {
    pub fn process_id(&self) -> u64 {
        self.process.id
    }

    /// `namespace.function` of the running function.
    pub fn function(&self) -> &str {
        &self.meta.qualified
    }

    /// Value passed by the predecessor, or the invocation argument.
    pub fn argument(&self) -> Option<&Payload> {
        self.argument.as_ref()
    }

    pub fn argument_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.argument.as_ref().and_then(downcast)
    }

    /// The escalation being handled, when running as an escalation handler.
    pub fn escalation(&self) -> Option<&Escalation> {
        self.escalation
    }

    /// Object of the `position`-th resource parameter.
    pub fn resource(&self, position: usize) -> Option<&Payload> {
        let index = self.meta.resource_params.get(position)?;
        self.objects.get(index)
    }

    pub fn resource_as<T: Any + Send + Sync>(&self, position: usize) -> Option<Arc<T>> {
        self.resource(position).and_then(downcast)
    }

    /// Runs `f` on the namespace state of this process, creating it on first
    /// access. `None` if the namespace declares no state or it is not an `S`.
    pub fn with_state<S, R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R>
    where
        S: Any + Send,
    {
        let cell = self.process.state_of(self.floor, self.meta.namespace)?;
        let mut state = lock(&cell);
        state.downcast_mut::<S>().map(f)
    }

    /// Instigates the flow named `name`.
    ///
    /// Asynchronous flows return a handle; the function completes only once
    /// every such flow has finished.
    pub fn flow(
        &mut self,
        name: &str,
        argument: Option<Payload>,
    ) -> Result<Option<AsynchronousHandle>, Escalation> {
        let Some(entry) = self.meta.interface.lookup(name) else {
            return Err(Escalation::unresolved(format!(
                "'{}' declares no flow '{name}'",
                self.meta.qualified
            )));
        };
        let flow = &self.meta.flows[entry.flow];
        instigate(self.floor, &self.meta.qualified, flow, argument, &mut self.instigated)
    }

    /// Instigates the flow bound to the `position`-th flow parameter.
    pub fn flow_parameter(
        &mut self,
        position: usize,
        argument: Option<Payload>,
    ) -> Result<Option<AsynchronousHandle>, Escalation> {
        let Some(&index) = self.meta.flow_params.get(position) else {
            return Err(Escalation::unresolved(format!(
                "'{}' has no flow parameter #{position}",
                self.meta.qualified
            )));
        };
        let flow = &self.meta.flows[index];
        instigate(self.floor, &self.meta.qualified, flow, argument, &mut self.instigated)
    }

    /// Creates an asynchronous flow completed by user code.
    ///
    /// Times out after the function's asynchronous timeout, if one is set.
    pub fn asynchronous_flow(&mut self) -> AsynchronousHandle {
        let m = self.meta.monitor;
        let monitor = &self.floor.monitors[m];
        let key = monitor.register_transient(self.meta.asynchronous_timeout);
        self.instigated.push(Instigation::Manual { completion: (m, key) });
        AsynchronousHandle::new(Arc::clone(monitor), key)
    }
}

/// What a duty sees while it runs.
pub struct DutyContext<'a> {
    pub(crate) floor: &'a FloorShared,
    pub(crate) process: u64,
    pub(crate) administration: &'a AdministrationMeta,
    pub(crate) duty: &'a DutyMeta,
    pub(crate) function: &'a FunctionMeta,
    pub(crate) extensions: Vec<Payload>,
    pub(crate) instigated: Vec<Instigation>,
}

impl DutyContext<'_> {
    pub fn process_id(&self) -> u64 {
        self.process
    }

    pub fn administration(&self) -> &str {
        &self.administration.name
    }

    pub fn duty(&self) -> &str {
        &self.duty.name
    }

    /// `namespace.function` of the administered function.
    pub fn function(&self) -> &str {
        &self.function.qualified
    }

    /// Extensions of the administered resources the function uses, in the
    /// administration's declaration order.
    pub fn extensions(&self) -> &[Payload] {
        &self.extensions
    }

    pub fn extension_as<T: Any + Send + Sync>(&self, position: usize) -> Option<Arc<T>> {
        self.extensions.get(position).and_then(downcast)
    }

    /// Instigates a flow declared by this duty.
    ///
    /// Sequential duty flows run before the administered function continues.
    pub fn flow(
        &mut self,
        name: &str,
        argument: Option<Payload>,
    ) -> Result<Option<AsynchronousHandle>, Escalation> {
        let owner = format!("{}.{}", self.administration.name, self.duty.name);
        let Some(flow) = self.duty.flows.iter().find(|f| f.name == name) else {
            return Err(Escalation::unresolved(format!("duty '{owner}' declares no flow '{name}'")));
        };
        instigate(self.floor, &owner, flow, argument, &mut self.instigated)
    }
}
