use std::sync::Arc;

use super::bind;
use crate::escalation::{CauseType, Escalation, EscalationMatch};
use crate::governance::{Governance, GovernanceFn};
use crate::issues::{AssetType, IssueCollector};
use crate::meta::{ParameterMeta, Strategy};
use crate::model::{
    FloorModel, FlowModel, FunctionModel, GovernanceModel, NamespaceModel, ResourceModel,
};
use crate::payload::{payload, Payload};
use crate::resources::{ResourceFn, Scope, SimpleResource, Sourced};
use crate::teams::{PassiveTeam, TeamRegistry};

fn teams() -> TeamRegistry {
    let mut teams = TeamRegistry::new();
    teams.register("workers", Arc::new(PassiveTeam::new("workers")));
    teams
}

fn noop() -> FunctionModel {
    FunctionModel::new("").body(|_ctx| Ok(None))
}

fn function(name: &str) -> FunctionModel {
    FunctionModel {
        name: name.to_string(),
        ..noop()
    }
}

fn resource(name: &str, scope: Scope) -> ResourceModel {
    ResourceModel::new(name, scope).factory(ResourceFn::arc(|_ctx| {
        Ok(Sourced::ready(SimpleResource::new(payload(0_u8))))
    }))
}

struct Nop;

impl Governance for Nop {
    fn govern(&mut self, _extension: Payload) -> Result<(), Escalation> {
        Ok(())
    }

    fn enforce(&mut self) -> Result<(), Escalation> {
        Ok(())
    }
}

fn sample() -> FloorModel {
    FloorModel::new()
        .default_team("workers")
        .resource(resource("db", Scope::Process).governed_by("tx"))
        .resource(resource("conn", Scope::Function).depends_on("db"))
        .governance(GovernanceModel::new("tx").factory(GovernanceFn::arc(|| Nop)))
        .escalation(CauseType::failure(), "orders.fallback")
        .namespace(
            NamespaceModel::new("orders")
                .function(
                    function("receive")
                        .with_resource("conn")
                        .with_argument()
                        .with_flow_parameter("audit")
                        .flow(FlowModel::sequential("validate", "validate"))
                        .flow(FlowModel::asynchronous("audit", "audit"))
                        .next("store"),
                )
                .function(function("validate"))
                .function(function("audit"))
                .function(function("store"))
                .function(function("fallback")),
        )
}

#[test]
fn binding_is_idempotent() {
    let model = sample();
    let teams = teams();
    let issues = IssueCollector::new();

    let first = bind(&model, &teams, &issues).expect("bound");
    let second = bind(&model, &teams, &issues).expect("bound");

    assert!(issues.is_empty(), "{:?}", issues.issues());
    assert_eq!(first.outline(), second.outline());
}

#[test]
fn links_parameters_flows_and_closure() {
    let issues = IssueCollector::new();
    let d = bind(&sample(), &teams(), &issues).expect("bound");
    assert!(issues.is_empty(), "{:?}", issues.issues());

    let receive = d.function("orders", "receive").expect("receive");
    let db = d.resource("db").expect("db").index();
    let conn = d.resource("conn").expect("conn").index();

    assert_eq!(
        receive.parameters(),
        &[ParameterMeta::Resource(conn), ParameterMeta::Argument, ParameterMeta::Flow(1)]
    );
    assert_eq!(receive.required_resources(), &[db, conn]);
    assert_eq!(receive.governances(), &[0]);
    assert_eq!(receive.next(), d.namespace("orders").and_then(|ns| ns.function_index("store")));

    let flows = receive.flows();
    assert_eq!(flows[0].strategy(), Strategy::Sequential);
    assert!(flows[0].target().is_some());
    assert!(flows[1].monitor.is_some());
    assert!(d.monitors().iter().any(|m| m == "flow:orders.receive.audit"));
    assert!(d.monitors().iter().any(|m| m == "function:orders.receive"));

    let names: Vec<&str> = receive.interface().entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["audit", "validate"]);
    assert!(receive.interface().lookup("audit").expect("audit").returns_handle);

    let fallback = d.function("orders", "fallback").expect("fallback").index();
    assert_eq!(
        d.process_escalations().resolve(&CauseType::timeout()),
        EscalationMatch::Handler(fallback)
    );
}

#[test]
fn reports_issues_and_skips_offenders() {
    let model = FloorModel::new()
        .default_team("workers")
        .namespace(
            NamespaceModel::new("app")
                .function(function("lazy").team("nobody"))
                .function(FunctionModel::new("hollow"))
                .function(function("needy").with_resource("ghost"))
                .function(function("dup"))
                .function(function("dup"))
                .function(function("dangling").flow(FlowModel::parallel("out", "missing"))),
        );
    let issues = IssueCollector::new();
    let d = bind(&model, &teams(), &issues).expect("bound");

    assert!(issues.mentions(AssetType::Function, "app.lazy", "unknown team"));
    assert!(issues.mentions(AssetType::Function, "app.hollow", "without a body"));
    assert!(issues.mentions(AssetType::Function, "app.needy", "unknown resource"));
    assert!(issues.mentions(AssetType::Function, "app.dup", "duplicate"));
    assert!(issues.mentions(AssetType::Flow, "app.dangling.out", "unresolved flow target"));

    assert!(d.function("app", "lazy").is_none());
    assert!(d.function("app", "hollow").is_none());
    assert!(d.function("app", "needy").is_none());
    assert!(d.function("app", "dup").is_some());
    let dangling = d.function("app", "dangling").expect("still bound");
    assert!(dangling.flows()[0].target().is_none());
}

#[test]
fn derived_namespace_overrides_and_inherits() {
    let model = FloorModel::new()
        .default_team("workers")
        .namespace(NamespaceModel::new("derived").extends("base").function(function("step")))
        .namespace(
            NamespaceModel::new("base")
                .function(function("start").next("step"))
                .function(function("step")),
        );
    let issues = IssueCollector::new();
    let d = bind(&model, &teams(), &issues).expect("bound");
    assert!(issues.is_empty(), "{:?}", issues.issues());

    let derived_start = d.function("derived", "start").expect("inherited");
    let derived_step = d.function("derived", "step").expect("override");
    let base_start = d.function("base", "start").expect("base");
    let base_step = d.function("base", "step").expect("base");

    assert_eq!(derived_start.next(), Some(derived_step.index()));
    assert_eq!(base_start.next(), Some(base_step.index()));
    assert_eq!(d.namespace("derived").and_then(|ns| ns.base()), d.namespace("base").map(|ns| ns.index()));
}

#[test]
fn scope_width_and_cycles_drop_dependencies() {
    let model = FloorModel::new()
        .default_team("workers")
        .resource(resource("session", Scope::Thread))
        .resource(resource("pool", Scope::Floor).depends_on("session"))
        .resource(resource("a", Scope::Process).depends_on("b"))
        .resource(resource("b", Scope::Process).depends_on("a"))
        .namespace(NamespaceModel::new("app").function(function("f").with_resource("a")));
    let issues = IssueCollector::new();
    let d = bind(&model, &teams(), &issues).expect("bound");

    assert!(issues.mentions(AssetType::Resource, "pool", "cannot depend"));
    assert!(d.resource("pool").expect("pool").dependencies().is_empty());

    assert!(issues.mentions(AssetType::Resource, "b", "dependency cycle"));
    let a = d.resource("a").expect("a").index();
    let b = d.resource("b").expect("b").index();
    assert_eq!(d.resource("a").expect("a").dependencies(), &[b]);
    assert!(d.resource("b").expect("b").dependencies().is_empty());
    assert_eq!(d.function("app", "f").expect("f").required_resources(), &[b, a]);
}

#[test]
fn ambiguous_and_duplicate_escalations_are_reported() {
    let io = CauseType::new("IOFailure");
    let model = FloorModel::new()
        .default_team("workers")
        .escalation(CauseType::timeout(), "recover")
        .namespace(
            NamespaceModel::new("one")
                .function(function("recover"))
                .function(
                    function("work")
                        .escalation(io.clone(), "recover")
                        .escalation(io, "other.recover"),
                ),
        )
        .namespace(NamespaceModel::new("other").function(function("recover")));
    let issues = IssueCollector::new();
    let d = bind(&model, &teams(), &issues).expect("bound");

    assert!(issues.mentions(AssetType::Floor, "process", "ambiguous"));
    assert!(d.process_escalations().is_empty());

    assert!(issues.mentions(AssetType::Function, "one.work", "duplicate escalation cause"));
    let work = d.function("one", "work").expect("work");
    let local = d.function("one", "recover").expect("recover").index();
    assert_eq!(work.escalations().entries().len(), 1);
    assert_eq!(work.escalations().entries()[0].handler, local);
}

#[test]
fn nothing_bound_returns_none() {
    let model = FloorModel::new().namespace(NamespaceModel::new("app").function(function("f")));
    let issues = IssueCollector::new();

    assert!(bind(&model, &teams(), &issues).is_none());
    assert!(issues.mentions(AssetType::Function, "app.f", "no default team"));
    assert!(issues.mentions(AssetType::Floor, "floor", "no function could be bound"));
}
