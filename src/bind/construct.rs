//! Pass 1: validate items and hand out indices.

use std::collections::{HashMap, HashSet};

use super::inherit::{binding_order, effective_functions};
use super::{Binder, FunctionLinks};
use crate::escalation::EscalationTable;
use crate::issues::AssetType;
use crate::meta::{
    AdministrationMeta, DutyMeta, FlowInterface, FlowMeta, FunctionMeta, GovernanceMeta,
    NamespaceMeta, ParameterMeta, ResourceMeta, Strategy,
};
use crate::model::{
    AdministrationModel, FlowModel, FunctionModel, GovernanceModel, ParameterModel, ResourceModel,
};
use crate::resources::Scope;

impl Binder<'_> {
    pub(super) fn construct(&mut self) {
        let model = self.model;
        for resource in &model.resources {
            self.construct_resource(resource, None);
        }
        for governance in &model.governances {
            self.construct_governance(governance);
        }
        for administration in &model.administrations {
            self.construct_administration(administration);
        }
        self.construct_namespaces();
    }

    fn construct_resource(&mut self, r: &ResourceModel, namespace: Option<usize>) {
        let qualified = match namespace {
            Some(ns) => format!("{}.{}", self.out.namespaces[ns].name, r.name),
            None => r.name.clone(),
        };
        if r.name.is_empty() {
            self.issue(AssetType::Resource, &qualified, "resource constructed without a name");
            return;
        }
        if namespace.is_none() && r.scope == Scope::Namespace {
            self.issue(AssetType::Resource, &qualified, "namespace scope requires a declaring namespace");
            return;
        }
        if r.instances.is_empty() {
            self.issue(AssetType::Resource, &qualified, "resource constructed without a factory");
            return;
        }
        if r.default_instance >= r.instances.len() {
            self.issue(
                AssetType::Resource,
                &qualified,
                &format!("default instance {} out of range ({} instances)", r.default_instance, r.instances.len()),
            );
            return;
        }
        let taken = match namespace {
            Some(ns) => self.namespace_resources[ns].contains_key(&r.name),
            None => self.floor_resources.contains_key(&r.name),
        };
        if taken {
            self.issue(AssetType::Resource, &qualified, "duplicate resource name");
            return;
        }

        let index = self.out.resources.len();
        let monitor = self.monitor(format!("resource:{qualified}"));
        self.out.resources.push(ResourceMeta {
            index,
            name: r.name.clone(),
            scope: r.scope,
            namespace,
            instances: r.instances.clone(),
            default_instance: r.default_instance,
            dependency_names: r.dependencies.clone(),
            dependencies: Vec::new(),
            governed_by_names: r.governed_by.clone(),
            governed_by: Vec::new(),
            timeout: r.timeout,
            monitor,
        });
        match namespace {
            Some(ns) => self.namespace_resources[ns].insert(r.name.clone(), index),
            None => self.floor_resources.insert(r.name.clone(), index),
        };
    }

    fn construct_governance(&mut self, g: &GovernanceModel) {
        if g.name.is_empty() {
            self.issue(AssetType::Governance, "", "governance constructed without a name");
            return;
        }
        let Some(factory) = g.factory.clone() else {
            self.issue(AssetType::Governance, &g.name, "governance constructed without a factory");
            return;
        };
        if self.governance_names.contains_key(&g.name) {
            self.issue(AssetType::Governance, &g.name, "duplicate governance name");
            return;
        }
        let Some(team) = self.team(g.team.as_ref(), AssetType::Governance, &g.name) else {
            return;
        };

        let index = self.out.governances.len();
        self.out.governances.push(GovernanceMeta {
            index,
            name: g.name.as_str().into(),
            factory,
            extension: g.extension.clone(),
            team,
            escalations: EscalationTable::default(),
        });
        self.governance_names.insert(g.name.clone(), index);
        self.governance_links.push(g.escalations.clone());
    }

    fn construct_administration(&mut self, a: &AdministrationModel) {
        if a.name.is_empty() {
            self.issue(AssetType::Administration, "", "administration constructed without a name");
            return;
        }
        let Some(provider) = a.provider.clone() else {
            self.issue(AssetType::Administration, &a.name, "administration constructed without a provider");
            return;
        };
        if self.administration_names.contains_key(&a.name) {
            self.issue(AssetType::Administration, &a.name, "duplicate administration name");
            return;
        }
        let Some(team) = self.team(a.team.as_ref(), AssetType::Administration, &a.name) else {
            return;
        };

        let mut resources = Vec::with_capacity(a.resources.len());
        for name in &a.resources {
            let Some(&idx) = self.floor_resources.get(name) else {
                self.issue(AssetType::Administration, &a.name, &format!("administers unknown resource '{name}'"));
                return;
            };
            if !a.extension.is_empty() && !self.out.resources[idx].exposes(&a.extension) {
                self.issue(
                    AssetType::Administration,
                    &a.name,
                    &format!("resource '{name}' does not expose extension '{}'", a.extension),
                );
                return;
            }
            resources.push(idx);
        }

        let mut duty_names = HashSet::new();
        let mut duties = Vec::with_capacity(a.duties.len());
        for duty in &a.duties {
            let qualified = format!("{}.{}", a.name, duty.name);
            if duty.name.is_empty() {
                self.issue(AssetType::Duty, &qualified, "duty constructed without a name");
                return;
            }
            if !duty_names.insert(duty.name.as_str()) {
                self.issue(AssetType::Administration, &a.name, &format!("duplicate duty name '{}'", duty.name));
                return;
            }
            let Some(flows) = self.construct_flows(&duty.flows, &qualified, "duty", AssetType::Duty) else {
                return;
            };
            duties.push(DutyMeta {
                name: duty.name.clone(),
                flows,
            });
        }

        let index = self.out.administrations.len();
        self.out.administrations.push(AdministrationMeta {
            index,
            name: a.name.clone(),
            provider,
            extension: a.extension.clone(),
            team,
            resources,
            duties,
        });
        self.administration_names.insert(a.name.clone(), index);
    }

    /// Validates flow names and declares monitors for asynchronous flows.
    ///
    /// Monitors are only declared once all names validate.
    fn construct_flows(
        &mut self,
        flows: &[FlowModel],
        owner: &str,
        prefix: &str,
        asset_type: AssetType,
    ) -> Option<Vec<FlowMeta>> {
        let mut names = HashSet::new();
        for flow in flows {
            if flow.name.is_empty() {
                self.issue(asset_type, owner, "flow declared without a name");
                return None;
            }
            if !names.insert(flow.name.as_str()) {
                self.issue(asset_type, owner, &format!("duplicate flow name '{}'", flow.name));
                return None;
            }
        }
        Some(
            flows
                .iter()
                .map(|flow| {
                    let monitor = (flow.strategy == Strategy::Asynchronous)
                        .then(|| self.monitor(format!("{prefix}:{owner}.{}", flow.name)));
                    FlowMeta {
                        name: flow.name.clone(),
                        target_name: flow.target.clone(),
                        target: None,
                        strategy: flow.strategy,
                        timeout: flow.timeout,
                        has_parameter: flow.has_parameter,
                        monitor,
                    }
                })
                .collect(),
        )
    }

    fn construct_namespaces(&mut self) {
        let model = self.model;
        let order = binding_order(&model.namespaces, self.issues);
        let mut by_model: HashMap<usize, usize> = HashMap::new();
        let mut effective: Vec<Vec<&FunctionModel>> = Vec::new();

        for model_idx in order {
            let ns = &model.namespaces[model_idx];
            let base = ns
                .extends
                .as_ref()
                .and_then(|b| model.namespaces.iter().position(|n| &n.name == b))
                .and_then(|b| by_model.get(&b).copied());
            let index = self.out.namespaces.len();
            self.out.namespaces.push(NamespaceMeta {
                index,
                name: ns.name.clone(),
                base,
                state: ns.state.clone(),
                functions: HashMap::new(),
                order: Vec::new(),
            });
            self.namespace_resources.push(HashMap::new());
            by_model.insert(model_idx, index);

            for resource in &ns.resources {
                self.construct_resource(resource, Some(index));
            }

            let inherited: Vec<&FunctionModel> = base.map(|b| effective[b].clone()).unwrap_or_default();
            let functions = effective_functions(ns, &inherited, self.issues);
            for function in &functions {
                self.construct_function(function, index);
            }
            effective.push(functions);
        }
    }

    fn construct_function(&mut self, f: &FunctionModel, namespace: usize) {
        let qualified = format!("{}.{}", self.out.namespaces[namespace].name, f.name);
        if f.name.is_empty() {
            self.issue(AssetType::Function, &qualified, "function constructed without a name");
            return;
        }
        let Some(body) = f.body.clone() else {
            self.issue(AssetType::Function, &qualified, "function constructed without a body");
            return;
        };
        let Some(team) = self.team(f.team.as_ref(), AssetType::Function, &qualified) else {
            return;
        };

        let mut parameters = Vec::with_capacity(f.parameters.len());
        let mut resource_params = Vec::new();
        let mut flow_params = Vec::new();
        for param in &f.parameters {
            match param {
                ParameterModel::Resource(name) => {
                    let Some(idx) = self.resolve_resource(Some(namespace), name) else {
                        self.issue(AssetType::Function, &qualified, &format!("unknown resource '{name}'"));
                        return;
                    };
                    resource_params.push(idx);
                    parameters.push(ParameterMeta::Resource(idx));
                }
                ParameterModel::Flow(name) => {
                    let Some(idx) = f.flows.iter().position(|flow| &flow.name == name) else {
                        self.issue(AssetType::Function, &qualified, &format!("undeclared flow '{name}'"));
                        return;
                    };
                    flow_params.push(idx);
                    parameters.push(ParameterMeta::Flow(idx));
                }
                ParameterModel::Argument => parameters.push(ParameterMeta::Argument),
                ParameterModel::Context => parameters.push(ParameterMeta::Context),
            }
        }
        let Some(flows) = self.construct_flows(&f.flows, &qualified, "flow", AssetType::Function) else {
            return;
        };

        let index = self.out.functions.len();
        let monitor = self.monitor(format!("function:{qualified}"));
        let interface = FlowInterface::build(&flows);
        self.out.functions.push(FunctionMeta {
            index,
            namespace,
            name: f.name.clone(),
            qualified,
            body,
            team,
            parameters,
            resource_params,
            flows,
            flow_params,
            next_name: f.next.clone(),
            next: None,
            escalations: EscalationTable::default(),
            pre_duties: Vec::new(),
            post_duties: Vec::new(),
            governances: Vec::new(),
            required: Vec::new(),
            monitor,
            asynchronous_timeout: f.asynchronous_timeout,
            interface,
        });
        let ns = &mut self.out.namespaces[namespace];
        ns.functions.insert(f.name.clone(), index);
        ns.order.push(index);
        self.function_links.push(FunctionLinks {
            escalations: f.escalations.clone(),
            pre_duties: f.pre_duties.clone(),
            post_duties: f.post_duties.clone(),
            governances: f.governances.clone(),
        });
    }
}
