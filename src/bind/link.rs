//! Pass 2: resolve every name recorded in pass 1 into an index.

use std::collections::HashSet;

use super::{Binder, FunctionLinks};
use crate::escalation::{EscalationEntry, EscalationTable};
use crate::issues::AssetType;
use crate::meta::DutyRef;
use crate::model::EscalationModel;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Open,
    Done,
}

impl Binder<'_> {
    pub(super) fn link(&mut self) {
        self.link_dependencies();
        self.break_cycles();
        self.link_governed_by();
        self.link_flows();
        self.link_duty_flows();

        let governance_links = std::mem::take(&mut self.governance_links);
        for (i, entries) in governance_links.iter().enumerate() {
            let name = self.out.governances[i].name.to_string();
            let table = self.escalation_table(None, entries, AssetType::Governance, &name);
            self.out.governances[i].escalations = table;
        }
        self.out.process_escalations =
            self.escalation_table(None, &self.model.escalations, AssetType::Floor, "process");

        let function_links = std::mem::take(&mut self.function_links);
        for (i, links) in function_links.iter().enumerate() {
            self.link_function(i, links);
        }
    }

    fn link_dependencies(&mut self) {
        for i in 0..self.out.resources.len() {
            let r = &self.out.resources[i];
            let mut deps = Vec::with_capacity(r.dependency_names.len());
            for name in &r.dependency_names {
                let Some(dep) = self.resolve_resource(r.namespace, name) else {
                    self.issue(AssetType::Resource, &r.name, &format!("depends on unknown resource '{name}'"));
                    continue;
                };
                let wider = self.out.resources[dep].scope;
                if !r.scope.may_depend_on(wider) {
                    self.issue(
                        AssetType::Resource,
                        &r.name,
                        &format!("{} scope cannot depend on {} scoped '{name}'", r.scope, wider),
                    );
                    continue;
                }
                deps.push(dep);
            }
            self.out.resources[i].dependencies = deps;
        }
    }

    /// Drops every dependency edge that closes a cycle.
    fn break_cycles(&mut self) {
        let mut state = vec![Visit::New; self.out.resources.len()];
        for start in 0..state.len() {
            if state[start] == Visit::New {
                self.visit(start, &mut state);
            }
        }
    }

    fn visit(&mut self, r: usize, state: &mut [Visit]) {
        state[r] = Visit::Open;
        let deps = std::mem::take(&mut self.out.resources[r].dependencies);
        let mut kept = Vec::with_capacity(deps.len());
        for dep in deps {
            match state[dep] {
                Visit::Open => {
                    let (name, other) = (&self.out.resources[r].name, &self.out.resources[dep].name);
                    self.issue(AssetType::Resource, name, &format!("dependency cycle through '{other}'"));
                }
                Visit::New => {
                    self.visit(dep, state);
                    kept.push(dep);
                }
                Visit::Done => kept.push(dep),
            }
        }
        self.out.resources[r].dependencies = kept;
        state[r] = Visit::Done;
    }

    fn link_governed_by(&mut self) {
        for i in 0..self.out.resources.len() {
            let r = &self.out.resources[i];
            let mut governed_by = Vec::new();
            for name in &r.governed_by_names {
                let Some(&g) = self.governance_names.get(name) else {
                    self.issue(AssetType::Resource, &r.name, &format!("governed by unknown governance '{name}'"));
                    continue;
                };
                let extension = &self.out.governances[g].extension;
                if !extension.is_empty() && !r.exposes(extension) {
                    self.issue(
                        AssetType::Resource,
                        &r.name,
                        &format!("does not expose extension '{extension}' required by '{name}'"),
                    );
                    continue;
                }
                if !governed_by.contains(&g) {
                    governed_by.push(g);
                }
            }
            self.out.resources[i].governed_by = governed_by;
        }
    }

    fn link_flows(&mut self) {
        for i in 0..self.out.functions.len() {
            let f = &self.out.functions[i];
            let from = Some(f.namespace);
            let targets: Vec<Option<usize>> = f
                .flows
                .iter()
                .map(|flow| {
                    let target = self.resolve_local(from, &flow.target_name);
                    if target.is_none() {
                        self.issue(
                            AssetType::Flow,
                            &format!("{}.{}", f.qualified, flow.name),
                            &format!("unresolved flow target '{}'", flow.target_name),
                        );
                    }
                    target
                })
                .collect();
            let next = f.next_name.as_ref().and_then(|name| {
                let next = self.resolve_local(from, name);
                if next.is_none() {
                    self.issue(AssetType::Function, &f.qualified, &format!("unresolved next '{name}'"));
                }
                next
            });

            let f = &mut self.out.functions[i];
            for (flow, target) in f.flows.iter_mut().zip(targets) {
                flow.target = target;
            }
            f.next = next;
        }
    }

    fn link_duty_flows(&mut self) {
        for a in 0..self.out.administrations.len() {
            for d in 0..self.out.administrations[a].duties.len() {
                let admin = &self.out.administrations[a];
                let duty = &admin.duties[d];
                let targets: Vec<Option<usize>> = duty
                    .flows
                    .iter()
                    .map(|flow| {
                        let owner = format!("{}.{}.{}", admin.name, duty.name, flow.name);
                        self.resolve_global(None, &flow.target_name, AssetType::Flow, &owner, "flow target")
                    })
                    .collect();
                let flows = &mut self.out.administrations[a].duties[d].flows;
                for (flow, target) in flows.iter_mut().zip(targets) {
                    flow.target = target;
                }
            }
        }
    }

    /// Builds one scope's table. A cause declared twice is reported and the
    /// first declaration kept.
    fn escalation_table(
        &self,
        from: Option<usize>,
        entries: &[EscalationModel],
        asset_type: AssetType,
        asset_name: &str,
    ) -> EscalationTable {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.cause.name()) {
                self.issue(
                    asset_type,
                    asset_name,
                    &format!("duplicate escalation cause '{}'", entry.cause.name()),
                );
                continue;
            }
            let Some(handler) =
                self.resolve_global(from, &entry.handler, asset_type, asset_name, "escalation handler")
            else {
                continue;
            };
            out.push(EscalationEntry {
                cause: entry.cause.clone(),
                handler,
            });
        }
        EscalationTable::new(out)
    }

    fn duty_refs(&self, duties: &[(String, String)], qualified: &str) -> Vec<DutyRef> {
        duties
            .iter()
            .filter_map(|(admin, duty)| {
                let found = self.administration_names.get(admin).and_then(|&a| {
                    self.out.administrations[a]
                        .duty_index(duty)
                        .map(|d| DutyRef { administration: a, duty: d })
                });
                if found.is_none() {
                    self.issue(AssetType::Function, qualified, &format!("unknown duty '{admin}.{duty}'"));
                }
                found
            })
            .collect()
    }

    /// Post-order closure of `roots` over resource dependencies.
    fn required(&self, roots: impl IntoIterator<Item = usize>) -> Vec<usize> {
        fn walk(binder: &Binder<'_>, r: usize, seen: &mut HashSet<usize>, out: &mut Vec<usize>) {
            if !seen.insert(r) {
                return;
            }
            for &dep in &binder.out.resources[r].dependencies {
                walk(binder, dep, seen, out);
            }
            out.push(r);
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for root in roots {
            walk(self, root, &mut seen, &mut out);
        }
        out
    }

    fn link_function(&mut self, i: usize, links: &FunctionLinks) {
        let f = &self.out.functions[i];
        let qualified = f.qualified.clone();

        let escalations = self.escalation_table(Some(f.namespace), &links.escalations, AssetType::Function, &qualified);
        let pre_duties = self.duty_refs(&links.pre_duties, &qualified);
        let post_duties = self.duty_refs(&links.post_duties, &qualified);

        let administered = pre_duties
            .iter()
            .chain(&post_duties)
            .flat_map(|d| self.out.administrations[d.administration].resources.iter().copied());
        let roots: Vec<usize> = f.resource_params.iter().copied().chain(administered).collect();
        let required = self.required(roots);

        let mut governances: Vec<usize> = Vec::new();
        for name in &links.governances {
            match self.governance_names.get(name) {
                Some(&g) if !governances.contains(&g) => governances.push(g),
                Some(_) => {}
                None => self.issue(AssetType::Function, &qualified, &format!("unknown governance '{name}'")),
            }
        }
        for &r in &required {
            for &g in &self.out.resources[r].governed_by {
                if !governances.contains(&g) {
                    governances.push(g);
                }
            }
        }

        let f = &mut self.out.functions[i];
        f.escalations = escalations;
        f.pre_duties = pre_duties;
        f.post_duties = post_duties;
        f.required = required;
        f.governances = governances;
    }
}
