//! # Descriptors: the immutable output of [`bind`](crate::bind).
//!
//! Every descriptor is addressed by a stable index into [`Descriptors`].
//! Links between descriptors are indices too; a link the binder could not
//! resolve is `None` and escalates with `Unresolved` if used at runtime.
//!
//! Readiness monitors are declared here by index and name only; the process
//! floor instantiates one monitor per entry.

mod outline;

pub use outline::DescriptorOutline;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::administration::Administration;
use crate::core::FunctionBody;
use crate::escalation::EscalationTable;
use crate::governance::GovernanceFactory;
use crate::model::StateFactory;
use crate::resources::{ResourceFactory, Scope};

/// Instigation strategy of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Same thread, before the instigating function's `next`.
    Sequential,
    /// New thread; not awaited.
    Parallel,
    /// New thread; awaited by the instigating job before it completes.
    Asynchronous,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Parallel => "parallel",
            Strategy::Asynchronous => "asynchronous",
        }
    }
}

/// A bound namespace.
pub struct NamespaceMeta {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) base: Option<usize>,
    pub(crate) state: Option<StateFactory>,
    /// Function name → function index (own and inherited).
    pub(crate) functions: HashMap<String, usize>,
    /// Function indices in binding order.
    pub(crate) order: Vec<usize>,
}

impl NamespaceMeta {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<usize> {
        self.base
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.get(name).copied()
    }

    pub fn function_indices(&self) -> &[usize] {
        &self.order
    }
}

/// A bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterMeta {
    /// Index of a resource binding.
    Resource(usize),
    Argument,
    Context,
    /// Index into the function's flows.
    Flow(usize),
}

/// A bound flow.
#[derive(Debug, Clone)]
pub struct FlowMeta {
    pub(crate) name: String,
    pub(crate) target_name: String,
    pub(crate) target: Option<usize>,
    pub(crate) strategy: Strategy,
    pub(crate) timeout: Option<Duration>,
    pub(crate) has_parameter: bool,
    /// Monitor for asynchronous flows.
    pub(crate) monitor: Option<usize>,
}

impl FlowMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn has_parameter(&self) -> bool {
        self.has_parameter
    }
}

/// One row of a [`FlowInterface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInterfaceEntry {
    pub name: String,
    pub flow: usize,
    pub has_parameter: bool,
    pub returns_handle: bool,
}

/// Flow dispatch table of one function, sorted by flow name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowInterface {
    entries: Vec<FlowInterfaceEntry>,
}

impl FlowInterface {
    pub(crate) fn build(flows: &[FlowMeta]) -> Self {
        let mut entries: Vec<FlowInterfaceEntry> = flows
            .iter()
            .enumerate()
            .map(|(flow, meta)| FlowInterfaceEntry {
                name: meta.name.clone(),
                flow,
                has_parameter: meta.has_parameter,
                returns_handle: meta.strategy == Strategy::Asynchronous,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    /// Looks a flow up by name.
    pub fn lookup(&self, name: &str) -> Option<&FlowInterfaceEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn entries(&self) -> &[FlowInterfaceEntry] {
        &self.entries
    }
}

/// Reference to one duty of one administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyRef {
    pub administration: usize,
    pub duty: usize,
}

/// A bound function.
pub struct FunctionMeta {
    pub(crate) index: usize,
    pub(crate) namespace: usize,
    pub(crate) name: String,
    pub(crate) qualified: String,
    pub(crate) body: FunctionBody,
    pub(crate) team: usize,
    pub(crate) parameters: Vec<ParameterMeta>,
    /// Resource index per resource parameter, in parameter order.
    pub(crate) resource_params: Vec<usize>,
    pub(crate) flows: Vec<FlowMeta>,
    /// Flow index per flow parameter, in parameter order.
    pub(crate) flow_params: Vec<usize>,
    pub(crate) next_name: Option<String>,
    pub(crate) next: Option<usize>,
    pub(crate) escalations: EscalationTable,
    pub(crate) pre_duties: Vec<DutyRef>,
    pub(crate) post_duties: Vec<DutyRef>,
    pub(crate) governances: Vec<usize>,
    /// Resources to activate, dependencies first.
    pub(crate) required: Vec<usize>,
    pub(crate) monitor: usize,
    pub(crate) asynchronous_timeout: Option<Duration>,
    pub(crate) interface: FlowInterface,
}

impl FunctionMeta {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn namespace(&self) -> usize {
        self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `namespace.function`.
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    pub fn team(&self) -> usize {
        self.team
    }

    pub fn parameters(&self) -> &[ParameterMeta] {
        &self.parameters
    }

    pub fn flows(&self) -> &[FlowMeta] {
        &self.flows
    }

    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub fn escalations(&self) -> &EscalationTable {
        &self.escalations
    }

    pub fn governances(&self) -> &[usize] {
        &self.governances
    }

    pub fn required_resources(&self) -> &[usize] {
        &self.required
    }

    pub fn interface(&self) -> &FlowInterface {
        &self.interface
    }
}

/// A bound managed resource.
pub struct ResourceMeta {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) scope: Scope,
    /// Declaring namespace, `None` for floor-level resources.
    pub(crate) namespace: Option<usize>,
    pub(crate) instances: Vec<(String, Arc<dyn ResourceFactory>)>,
    pub(crate) default_instance: usize,
    pub(crate) dependency_names: Vec<String>,
    pub(crate) dependencies: Vec<usize>,
    pub(crate) governed_by_names: Vec<String>,
    pub(crate) governed_by: Vec<usize>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) monitor: usize,
}

impl ResourceMeta {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &[usize] {
        &self.dependencies
    }

    pub fn governed_by(&self) -> &[usize] {
        &self.governed_by
    }

    /// Factory of the default instance.
    pub(crate) fn factory(&self) -> &dyn ResourceFactory {
        self.instances[self.default_instance].1.as_ref()
    }

    /// `true` if every instance exposes `extension`.
    pub(crate) fn exposes(&self, extension: &str) -> bool {
        self.instances
            .iter()
            .all(|(_, f)| f.extensions().contains(&extension))
    }
}

/// A duty within a bound administration.
pub struct DutyMeta {
    pub(crate) name: String,
    pub(crate) flows: Vec<FlowMeta>,
}

impl DutyMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flows(&self) -> &[FlowMeta] {
        &self.flows
    }
}

/// A bound administration.
pub struct AdministrationMeta {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) provider: Arc<dyn Administration>,
    pub(crate) extension: String,
    pub(crate) team: usize,
    pub(crate) resources: Vec<usize>,
    pub(crate) duties: Vec<DutyMeta>,
}

impl AdministrationMeta {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resources(&self) -> &[usize] {
        &self.resources
    }

    pub fn duties(&self) -> &[DutyMeta] {
        &self.duties
    }

    pub fn duty_index(&self, name: &str) -> Option<usize> {
        self.duties.iter().position(|d| d.name == name)
    }
}

/// A bound governance.
pub struct GovernanceMeta {
    pub(crate) index: usize,
    pub(crate) name: Arc<str>,
    pub(crate) factory: Arc<dyn GovernanceFactory>,
    pub(crate) extension: String,
    pub(crate) team: usize,
    pub(crate) escalations: EscalationTable,
}

impl GovernanceMeta {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn escalations(&self) -> &EscalationTable {
        &self.escalations
    }
}

/// Everything the binder produced.
#[derive(Default)]
pub struct Descriptors {
    pub(crate) namespaces: Vec<NamespaceMeta>,
    pub(crate) functions: Vec<FunctionMeta>,
    pub(crate) resources: Vec<ResourceMeta>,
    pub(crate) administrations: Vec<AdministrationMeta>,
    pub(crate) governances: Vec<GovernanceMeta>,
    pub(crate) process_escalations: EscalationTable,
    pub(crate) monitors: Vec<String>,
}

impl Descriptors {
    pub fn namespaces(&self) -> &[NamespaceMeta] {
        &self.namespaces
    }

    pub fn functions(&self) -> &[FunctionMeta] {
        &self.functions
    }

    pub fn resources(&self) -> &[ResourceMeta] {
        &self.resources
    }

    pub fn administrations(&self) -> &[AdministrationMeta] {
        &self.administrations
    }

    pub fn governances(&self) -> &[GovernanceMeta] {
        &self.governances
    }

    pub fn process_escalations(&self) -> &EscalationTable {
        &self.process_escalations
    }

    /// Monitor names by index.
    pub fn monitors(&self) -> &[String] {
        &self.monitors
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceMeta> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Looks up `function` in `namespace` (inherited functions included).
    pub fn function(&self, namespace: &str, function: &str) -> Option<&FunctionMeta> {
        let ns = self.namespace(namespace)?;
        ns.function_index(function).map(|i| &self.functions[i])
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceMeta> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Structural summary for comparing two bind results.
    pub fn outline(&self) -> DescriptorOutline {
        DescriptorOutline::of(self)
    }
}
