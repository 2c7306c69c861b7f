use std::sync::Arc;
use std::time::Duration;

use crate::administration::Administration;
use crate::escalation::CauseType;
use crate::governance::GovernanceFactory;
use crate::model::{EscalationModel, FlowModel};
use crate::resources::{ResourceFactory, Scope};

/// Declaration of a managed resource binding.
#[derive(Clone)]
pub struct ResourceModel {
    pub(crate) name: String,
    pub(crate) scope: Scope,
    pub(crate) instances: Vec<(String, Arc<dyn ResourceFactory>)>,
    pub(crate) default_instance: usize,
    pub(crate) dependencies: Vec<String>,
    pub(crate) governed_by: Vec<String>,
    pub(crate) timeout: Option<Duration>,
}

impl ResourceModel {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
            instances: Vec::new(),
            default_instance: 0,
            dependencies: Vec::new(),
            governed_by: Vec::new(),
            timeout: None,
        }
    }

    /// Single-instance shorthand for `instance("default", factory)`.
    pub fn factory(self, factory: Arc<dyn ResourceFactory>) -> Self {
        self.instance("default", factory)
    }

    /// Adds a concrete instance.
    pub fn instance(mut self, name: impl Into<String>, factory: Arc<dyn ResourceFactory>) -> Self {
        self.instances.push((name.into(), factory));
        self
    }

    /// Index of the instance functions receive.
    pub fn default_instance(mut self, index: usize) -> Self {
        self.default_instance = index;
        self
    }

    /// Resource this one needs; resolved by name in the binder's second pass.
    pub fn depends_on(mut self, resource: impl Into<String>) -> Self {
        self.dependencies.push(resource.into());
        self
    }

    pub fn governed_by(mut self, governance: impl Into<String>) -> Self {
        self.governed_by.push(governance.into());
        self
    }

    /// How long a job may wait for this resource to become ready.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A duty within an administration, with the flows it may instigate.
#[derive(Clone, Debug, Default)]
pub struct DutyModel {
    pub(crate) name: String,
    pub(crate) flows: Vec<FlowModel>,
}

impl DutyModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flows: Vec::new(),
        }
    }

    /// Targets are `namespace.function` or a unique unqualified name.
    pub fn flow(mut self, flow: FlowModel) -> Self {
        self.flows.push(flow);
        self
    }
}

/// Declaration of an administration binding.
#[derive(Clone, Default)]
pub struct AdministrationModel {
    pub(crate) name: String,
    pub(crate) provider: Option<Arc<dyn Administration>>,
    pub(crate) extension: String,
    pub(crate) team: Option<String>,
    pub(crate) resources: Vec<String>,
    pub(crate) duties: Vec<DutyModel>,
}

impl AdministrationModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn provider(mut self, provider: Arc<dyn Administration>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Extension every administered resource must expose.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Administers a floor-level resource.
    pub fn administers(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn duty(mut self, duty: DutyModel) -> Self {
        self.duties.push(duty);
        self
    }
}

/// Declaration of a governance binding.
#[derive(Clone, Default)]
pub struct GovernanceModel {
    pub(crate) name: String,
    pub(crate) factory: Option<Arc<dyn GovernanceFactory>>,
    pub(crate) extension: String,
    pub(crate) team: Option<String>,
    pub(crate) escalations: Vec<EscalationModel>,
}

impl GovernanceModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn factory(mut self, factory: Arc<dyn GovernanceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Extension every governed resource must expose.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Team running activation and enforcement (defaults to the floor's).
    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Handler for escalations passing through while the governance is active.
    pub fn escalation(mut self, cause: CauseType, handler: impl Into<String>) -> Self {
        self.escalations.push(EscalationModel::new(cause, handler));
        self
    }
}
