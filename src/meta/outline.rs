use super::{Descriptors, FlowMeta};

/// Comparable rendering of a descriptor set: names, indices and links.
///
/// Two binds of the same model produce equal outlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorOutline {
    pub namespaces: Vec<String>,
    pub functions: Vec<String>,
    pub resources: Vec<String>,
    pub administrations: Vec<String>,
    pub governances: Vec<String>,
    pub process_escalations: Vec<String>,
    pub monitors: Vec<String>,
}

fn flows(flows: &[FlowMeta]) -> String {
    flows
        .iter()
        .map(|f| {
            format!(
                "{}:{}->{:?}/{:?}",
                f.name,
                f.strategy.as_str(),
                f.target,
                f.monitor
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

impl DescriptorOutline {
    pub(crate) fn of(d: &Descriptors) -> Self {
        let namespaces = d
            .namespaces
            .iter()
            .map(|ns| format!("#{} {} base={:?} fns={:?}", ns.index, ns.name, ns.base, ns.order))
            .collect();

        let functions = d
            .functions
            .iter()
            .map(|f| {
                let table: Vec<String> = f
                    .escalations
                    .entries()
                    .iter()
                    .map(|e| format!("{}->{}", e.cause.name(), e.handler))
                    .collect();
                format!(
                    "#{} {} ns={} team={} params={:?} flows=[{}] next={:?} pre={:?} post={:?} gov={:?} req={:?} esc={:?} mon={}",
                    f.index,
                    f.qualified,
                    f.namespace,
                    f.team,
                    f.parameters,
                    flows(&f.flows),
                    f.next,
                    f.pre_duties,
                    f.post_duties,
                    f.governances,
                    f.required,
                    table,
                    f.monitor
                )
            })
            .collect();

        let resources = d
            .resources
            .iter()
            .map(|r| {
                format!(
                    "#{} {} {} ns={:?} inst={}/{} deps={:?} gov={:?} mon={}",
                    r.index,
                    r.name,
                    r.scope,
                    r.namespace,
                    r.default_instance,
                    r.instances.len(),
                    r.dependencies,
                    r.governed_by,
                    r.monitor
                )
            })
            .collect();

        let administrations = d
            .administrations
            .iter()
            .map(|a| {
                let duties: Vec<String> = a
                    .duties
                    .iter()
                    .map(|duty| format!("{}[{}]", duty.name, flows(&duty.flows)))
                    .collect();
                format!(
                    "#{} {} ext={} team={} res={:?} duties={:?}",
                    a.index, a.name, a.extension, a.team, a.resources, duties
                )
            })
            .collect();

        let governances = d
            .governances
            .iter()
            .map(|g| {
                let table: Vec<String> = g
                    .escalations
                    .entries()
                    .iter()
                    .map(|e| format!("{}->{}", e.cause.name(), e.handler))
                    .collect();
                format!("#{} {} ext={} team={} esc={:?}", g.index, g.name, g.extension, g.team, table)
            })
            .collect();

        let process_escalations = d
            .process_escalations
            .entries()
            .iter()
            .map(|e| format!("{}->{}", e.cause.name(), e.handler))
            .collect();

        Self {
            namespaces,
            functions,
            resources,
            administrations,
            governances,
            process_escalations,
            monitors: d.monitors.clone(),
        }
    }
}
