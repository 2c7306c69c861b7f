//! Namespace inheritance: binding order and override collection.

use std::collections::{HashMap, HashSet};

use crate::issues::{AssetType, IssueSink};
use crate::model::{FunctionModel, NamespaceModel};

/// Model indices of the namespaces to bind, every base before its derived
/// namespaces (declaration order otherwise).
///
/// Unnamed or duplicate namespaces, unknown bases and inheritance cycles are
/// reported and excluded, together with everything deriving from them.
pub(crate) fn binding_order(namespaces: &[NamespaceModel], issues: &dyn IssueSink) -> Vec<usize> {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (i, ns) in namespaces.iter().enumerate() {
        if ns.name.is_empty() {
            issues.add_issue(AssetType::Namespace, &format!("#{i}"), "namespace constructed without a name", None);
            continue;
        }
        if ns.name.contains('.') {
            issues.add_issue(AssetType::Namespace, &ns.name, "namespace name must not contain '.'", None);
            continue;
        }
        if by_name.contains_key(ns.name.as_str()) {
            issues.add_issue(AssetType::Namespace, &ns.name, "duplicate namespace name", None);
            continue;
        }
        by_name.insert(ns.name.as_str(), i);
    }

    let mut depths: Vec<(usize, usize)> = Vec::new();
    for (i, ns) in namespaces.iter().enumerate() {
        if by_name.get(ns.name.as_str()) != Some(&i) {
            continue;
        }
        let mut seen: HashSet<usize> = HashSet::from([i]);
        let mut current = ns;
        let mut depth = 0;
        let ok = loop {
            let Some(base) = &current.extends else {
                break true;
            };
            let Some(&b) = by_name.get(base.as_str()) else {
                issues.add_issue(
                    AssetType::Namespace,
                    &ns.name,
                    &format!("extends unknown namespace '{base}'"),
                    None,
                );
                break false;
            };
            if !seen.insert(b) {
                issues.add_issue(
                    AssetType::Namespace,
                    &ns.name,
                    &format!("inheritance cycle through '{base}'"),
                    None,
                );
                break false;
            }
            depth += 1;
            current = &namespaces[b];
        };
        if ok {
            depths.push((depth, i));
        }
    }
    depths.sort_by_key(|(depth, _)| *depth);
    depths.into_iter().map(|(_, i)| i).collect()
}

/// A namespace's own functions (first declaration wins) followed by the
/// inherited ones it does not redefine.
pub(crate) fn effective_functions<'m>(
    namespace: &'m NamespaceModel,
    inherited: &[&'m FunctionModel],
    issues: &dyn IssueSink,
) -> Vec<&'m FunctionModel> {
    let mut names: HashSet<&str> = HashSet::new();
    let mut out: Vec<&'m FunctionModel> = Vec::new();
    for f in &namespace.functions {
        if !f.name.is_empty() && !names.insert(f.name.as_str()) {
            issues.add_issue(
                AssetType::Function,
                &format!("{}.{}", namespace.name, f.name),
                "duplicate function name in namespace",
                None,
            );
            continue;
        }
        out.push(f);
    }
    for f in inherited {
        if names.insert(f.name.as_str()) {
            out.push(f);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueCollector;

    #[test]
    fn bases_bind_before_derived_and_cycles_are_excluded() {
        let namespaces = vec![
            NamespaceModel::new("derived").extends("base"),
            NamespaceModel::new("base"),
            NamespaceModel::new("a").extends("b"),
            NamespaceModel::new("b").extends("a"),
            NamespaceModel::new("orphan").extends("missing"),
        ];
        let issues = IssueCollector::new();
        let order = binding_order(&namespaces, &issues);

        assert_eq!(order, vec![1, 0]);
        assert!(issues.mentions(AssetType::Namespace, "a", "cycle"));
        assert!(issues.mentions(AssetType::Namespace, "b", "cycle"));
        assert!(issues.mentions(AssetType::Namespace, "orphan", "unknown namespace"));
    }

    #[test]
    fn closest_definition_wins() {
        let base = NamespaceModel::new("base")
            .function(FunctionModel::new("f").team("base-team"))
            .function(FunctionModel::new("g"));
        let derived = NamespaceModel::new("derived")
            .function(FunctionModel::new("f").team("derived-team"))
            .function(FunctionModel::new("f"));
        let issues = IssueCollector::new();

        let inherited: Vec<&FunctionModel> = base.functions.iter().collect();
        let effective = effective_functions(&derived, &inherited, &issues);

        let names: Vec<&str> = effective.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["f", "g"]);
        assert_eq!(effective[0].team.as_deref(), Some("derived-team"));
        assert!(issues.mentions(AssetType::Function, "derived.f", "duplicate"));
    }
}
