//! # Two-pass meta-data binder.
//!
//! [`bind`] turns a [`FloorModel`] into immutable, cross-linked
//! [`Descriptors`]. It never fails fast: every problem becomes one issue on
//! the [`IssueSink`] keyed by the offending asset, and the offending item is
//! skipped (pass 1) or left unlinked (pass 2).
//!
//! ```text
//! pass 1 (construct)                         pass 2 (link)
//!   floor resources                            resource dependencies (scope width, cycles)
//!   governances                                governed-by links
//!   administrations (+ duties)                 flow / next / duty-flow targets
//!   namespaces (base first)                    duties, governances
//!     namespace resources                      escalation tables (function, governance, process)
//!     functions (own, then inherited)          required-resource closure, flow interfaces
//! ```
//!
//! Indices are handed out in pass 1 the moment an item validates and are
//! never reused, so binding the same model twice yields the same structure.
//!
//! ## Name resolution
//! - resources: own namespace, then its bases, then floor level
//! - flow and `next` targets: `namespace.function`, or a function of the
//!   instigating namespace (inherited functions included)
//! - escalation handlers and duty flows: `namespace.function`, or the single
//!   function with that name on the floor (a function's own table looks in
//!   its namespace first)

mod construct;
mod inherit;
mod link;

use std::collections::HashMap;

use crate::issues::{AssetType, IssueSink};
use crate::meta::Descriptors;
use crate::model::{EscalationModel, FloorModel};
use crate::teams::TeamRegistry;

/// Binds `model` against the registered `teams`.
///
/// Returns `None` only when no function at all could be bound; otherwise a
/// best-effort descriptor set is returned and every problem is on `issues`.
pub fn bind(model: &FloorModel, teams: &TeamRegistry, issues: &dyn IssueSink) -> Option<Descriptors> {
    let mut binder = Binder::new(model, teams, issues);
    binder.construct();
    binder.link();

    if binder.out.functions.is_empty() {
        issues.add_issue(AssetType::Floor, "floor", "no function could be bound", None);
        return None;
    }
    Some(binder.out)
}

/// Links recorded in pass 1 for resolution in pass 2.
#[derive(Default)]
struct FunctionLinks {
    escalations: Vec<EscalationModel>,
    pre_duties: Vec<(String, String)>,
    post_duties: Vec<(String, String)>,
    governances: Vec<String>,
}

struct Binder<'a> {
    model: &'a FloorModel,
    teams: &'a TeamRegistry,
    issues: &'a dyn IssueSink,
    out: Descriptors,
    floor_resources: HashMap<String, usize>,
    namespace_resources: Vec<HashMap<String, usize>>,
    governance_names: HashMap<String, usize>,
    administration_names: HashMap<String, usize>,
    function_links: Vec<FunctionLinks>,
    governance_links: Vec<Vec<EscalationModel>>,
}

impl<'a> Binder<'a> {
    fn new(model: &'a FloorModel, teams: &'a TeamRegistry, issues: &'a dyn IssueSink) -> Self {
        Self {
            model,
            teams,
            issues,
            out: Descriptors::default(),
            floor_resources: HashMap::new(),
            namespace_resources: Vec::new(),
            governance_names: HashMap::new(),
            administration_names: HashMap::new(),
            function_links: Vec::new(),
            governance_links: Vec::new(),
        }
    }

    fn issue(&self, asset_type: AssetType, asset_name: &str, message: &str) {
        self.issues.add_issue(asset_type, asset_name, message, None);
    }

    /// Declares a readiness monitor and returns its index.
    fn monitor(&mut self, name: String) -> usize {
        self.out.monitors.push(name);
        self.out.monitors.len() - 1
    }

    /// Team index for an explicit or default team name.
    fn team(&self, explicit: Option<&String>, asset_type: AssetType, asset_name: &str) -> Option<usize> {
        let Some(name) = explicit.or(self.model.default_team.as_ref()) else {
            self.issue(asset_type, asset_name, "no team named and no default team");
            return None;
        };
        let idx = self.teams.index_of(name);
        if idx.is_none() {
            self.issue(asset_type, asset_name, &format!("unknown team '{name}'"));
        }
        idx
    }

    /// Resolves a resource name visible from `namespace` (or floor level).
    fn resolve_resource(&self, namespace: Option<usize>, name: &str) -> Option<usize> {
        let mut current = namespace;
        while let Some(ns) = current {
            if let Some(&idx) = self.namespace_resources.get(ns).and_then(|m| m.get(name)) {
                return Some(idx);
            }
            current = self.out.namespaces[ns].base;
        }
        self.floor_resources.get(name).copied()
    }

    /// `namespace.function` or, with `from`, a function of that namespace.
    fn resolve_local(&self, from: Option<usize>, name: &str) -> Option<usize> {
        if let Some((ns, function)) = name.split_once('.') {
            return self
                .out
                .namespace(ns)
                .and_then(|meta| meta.function_index(function));
        }
        from.and_then(|ns| self.out.namespaces[ns].function_index(name))
    }

    /// Like [`resolve_local`](Self::resolve_local), falling back to the one
    /// function on the floor with this name. No candidate or several
    /// candidates are reported against `asset_name`.
    fn resolve_global(
        &self,
        from: Option<usize>,
        name: &str,
        asset_type: AssetType,
        asset_name: &str,
        what: &str,
    ) -> Option<usize> {
        if let Some(idx) = self.resolve_local(from, name) {
            return Some(idx);
        }
        let candidates: Vec<usize> = if name.contains('.') {
            Vec::new()
        } else {
            self.out
                .functions
                .iter()
                .filter(|f| f.name == name)
                .map(|f| f.index)
                .collect()
        };
        match candidates.as_slice() {
            [] => {
                self.issue(asset_type, asset_name, &format!("unresolved {what} '{name}'"));
                None
            }
            [only] => Some(*only),
            many => {
                let names: Vec<&str> = many
                    .iter()
                    .map(|&i| self.out.functions[i].qualified.as_str())
                    .collect();
                self.issue(
                    asset_type,
                    asset_name,
                    &format!("{what} '{name}' is ambiguous between {}", names.join(", ")),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests;
