//! # Floor model: the declarative input to [`bind`](crate::bind).
//!
//! Builders describe namespaces, functions, flows, resources,
//! administrations and governances by **name**. Nothing is validated here;
//! the binder reports every problem as an issue and links names in its
//! second pass, so declarations may appear in any order.
//!
//! ```text
//! FloorModel
//!  ├── resources        (floor-level: function/thread/process/floor scope)
//!  ├── administrations  ── duties ── flows
//!  ├── governances      ── escalations
//!  ├── escalations      (process table)
//!  └── namespaces
//!       ├── state factory
//!       ├── resources   (namespace scope)
//!       └── functions   ── parameters, flows, next, duties, escalations
//! ```
//!
//! ## Example
//! ```rust
//! use taskfloor::{FloorModel, FlowModel, FunctionModel, NamespaceModel};
//!
//! let model = FloorModel::new()
//!     .default_team("workers")
//!     .namespace(
//!         NamespaceModel::new("orders")
//!             .function(
//!                 FunctionModel::new("receive")
//!                     .body(|_ctx| Ok(None))
//!                     .flow(FlowModel::sequential("check", "validate")),
//!             )
//!             .function(FunctionModel::new("validate").body(|_ctx| Ok(None))),
//!     );
//! ```

mod function;
mod resource;

pub use function::{FlowModel, FunctionModel, ParameterModel};
pub use resource::{AdministrationModel, DutyModel, GovernanceModel, ResourceModel};

use std::any::Any;
use std::sync::Arc;

use crate::escalation::CauseType;
use crate::resources::Scope;

/// Creates a namespace's per-process state object.
pub type StateFactory = Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// `cause → handler` declaration. The handler is a function name, either
/// `namespace.function` or unqualified.
#[derive(Clone, Debug)]
pub struct EscalationModel {
    pub(crate) cause: CauseType,
    pub(crate) handler: String,
}

impl EscalationModel {
    pub fn new(cause: CauseType, handler: impl Into<String>) -> Self {
        Self {
            cause,
            handler: handler.into(),
        }
    }
}

/// Root of the declarative configuration.
#[derive(Clone, Default)]
pub struct FloorModel {
    pub(crate) default_team: Option<String>,
    pub(crate) resources: Vec<ResourceModel>,
    pub(crate) administrations: Vec<AdministrationModel>,
    pub(crate) governances: Vec<GovernanceModel>,
    pub(crate) namespaces: Vec<NamespaceModel>,
    pub(crate) escalations: Vec<EscalationModel>,
}

impl FloorModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Team used by functions that name none.
    pub fn default_team(mut self, team: impl Into<String>) -> Self {
        self.default_team = Some(team.into());
        self
    }

    /// Declares a floor-level resource, visible to every namespace.
    pub fn resource(mut self, resource: ResourceModel) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn administration(mut self, administration: AdministrationModel) -> Self {
        self.administrations.push(administration);
        self
    }

    pub fn governance(mut self, governance: GovernanceModel) -> Self {
        self.governances.push(governance);
        self
    }

    pub fn namespace(mut self, namespace: NamespaceModel) -> Self {
        self.namespaces.push(namespace);
        self
    }

    /// Adds an entry to the process-level escalation table.
    pub fn escalation(mut self, cause: CauseType, handler: impl Into<String>) -> Self {
        self.escalations.push(EscalationModel::new(cause, handler));
        self
    }
}

/// A named collection of functions sharing per-process state.
#[derive(Clone, Default)]
pub struct NamespaceModel {
    pub(crate) name: String,
    pub(crate) extends: Option<String>,
    pub(crate) state: Option<StateFactory>,
    pub(crate) resources: Vec<ResourceModel>,
    pub(crate) functions: Vec<FunctionModel>,
}

impl NamespaceModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Inherits every function of `base` not redefined here.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends = Some(base.into());
        self
    }

    /// State object created lazily, once per process, on first access.
    pub fn state<S, F>(mut self, f: F) -> Self
    where
        S: Any + Send,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.state = Some(Arc::new(move || Box::new(f()) as Box<dyn Any + Send>));
        self
    }

    /// Declares a namespace-scoped resource.
    ///
    /// The scope is forced to [`Scope::Namespace`].
    pub fn resource(mut self, mut resource: ResourceModel) -> Self {
        resource.scope = Scope::Namespace;
        self.resources.push(resource);
        self
    }

    pub fn function(mut self, function: FunctionModel) -> Self {
        self.functions.push(function);
        self
    }
}
