use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{EscalationHandler, FloorBuilder, ProcessFloor};
use crate::administration::AdministrationFn;
use crate::config::FloorConfig;
use crate::error::{RuntimeError, TeamError};
use crate::escalation::{CauseType, Escalation};
use crate::events::EventKind;
use crate::governance::{Governance, GovernanceFn};
use crate::issues::AssetType;
use crate::model::{
    AdministrationModel, DutyModel, FloorModel, FlowModel, FunctionModel, GovernanceModel, NamespaceModel,
    ResourceModel,
};
use crate::payload::{Payload, payload};
use crate::resources::{ResourceFn, Scope, SimpleResource, Sourced};
use crate::teams::{PassiveTeam, Team, ThreadPoolTeam, Work};

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
struct Counter {
    created: Arc<AtomicUsize>,
    recycled: Arc<AtomicUsize>,
}

impl Counter {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn recycled(&self) -> usize {
        self.recycled.load(Ordering::SeqCst)
    }

    fn resource(&self, name: &str, scope: Scope) -> ResourceModel {
        let counter = self.clone();
        ResourceModel::new(name, scope).factory(ResourceFn::arc(move |_ctx| {
            counter.created.fetch_add(1, Ordering::SeqCst);
            let recycled = Arc::clone(&counter.recycled);
            Ok(Sourced::ready(SimpleResource::new(payload(42_u32)).on_recycle(move || {
                recycled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
        }))
    }
}

fn logged(name: &'static str, log: &Log) -> FunctionModel {
    let log = log.clone();
    FunctionModel::new(name).body(move |_ctx| {
        log.push(name);
        Ok(None)
    })
}

fn failing(name: &'static str, cause: CauseType) -> FunctionModel {
    FunctionModel::new(name).body(move |_ctx| Err(Escalation::new(cause.clone(), "boom")))
}

fn passive(cfg: FloorConfig, model: &FloorModel) -> ProcessFloor {
    FloorBuilder::new(cfg)
        .with_team("workers", Arc::new(PassiveTeam::new("workers")))
        .build(model)
        .unwrap()
}

fn pooled(model: &FloorModel, handler: Option<Arc<dyn EscalationHandler>>) -> ProcessFloor {
    let mut builder = FloorBuilder::new(fast()).with_team("pool", Arc::new(ThreadPoolTeam::new("pool", 4).unwrap()));
    if let Some(handler) = handler {
        builder = builder.with_escalation_handler(handler);
    }
    builder.build(model).unwrap()
}

/// Assets still registered across every readiness monitor of the floor.
fn tracked_assets(floor: &ProcessFloor) -> usize {
    floor.shared.monitors.iter().map(|m| m.assets()).sum()
}

fn fast() -> FloorConfig {
    FloorConfig {
        monitor_interval: Duration::from_millis(5),
        grace: Duration::from_secs(5),
        ..FloorConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequential_flows_run_before_next_in_declaration_order() {
    let log = Log::default();
    let l = log.clone();
    let model = FloorModel::new().default_team("workers").namespace(
        NamespaceModel::new("orders")
            .function(
                FunctionModel::new("receive")
                    .flow(FlowModel::sequential("check", "validate"))
                    .flow(FlowModel::sequential("price", "price"))
                    .next("store")
                    .body(move |ctx| {
                        ctx.flow("check", None)?;
                        ctx.flow("price", None)?;
                        l.push("receive");
                        Ok(Some(payload(7_u32)))
                    }),
            )
            .function(logged("validate", &log))
            .function(logged("price", &log))
            .function({
                let log = log.clone();
                FunctionModel::new("store").body(move |ctx| {
                    let got = ctx.argument_as::<u32>().map_or(0, |v| *v);
                    log.push(format!("store {got}"));
                    Ok(None)
                })
            }),
    );
    let floor = passive(fast(), &model);

    let handle = floor.invoke("orders", "receive", None).unwrap();
    handle.wait().await.unwrap();

    assert_eq!(log.entries(), ["receive", "validate", "price", "store 7"]);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn process_resource_activates_once_for_concurrent_jobs() {
    const JOBS: usize = 8;
    let counter = Counter::default();
    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    let model = FloorModel::new()
        .default_team("pool")
        .resource(counter.resource("counter", Scope::Process))
        .namespace(
            NamespaceModel::new("fan")
                .function(
                    FunctionModel::new("out")
                        .flow(FlowModel::parallel("work", "work"))
                        .body(|ctx| {
                            for _ in 0..JOBS {
                                ctx.flow("work", None)?;
                            }
                            Ok(None)
                        }),
                )
                .function(FunctionModel::new("work").with_resource("counter").body(move |ctx| {
                    assert_eq!(ctx.resource_as::<u32>(0).map(|v| *v), Some(42));
                    s.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })),
        );
    let floor = FloorBuilder::new(fast())
        .with_team("pool", Arc::new(ThreadPoolTeam::new("pool", 4).unwrap()))
        .build(&model)
        .unwrap();

    let handle = floor.invoke("fan", "out", None).unwrap();
    handle.wait().await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), JOBS);
    assert_eq!(counter.created(), 1);
    assert_eq!(counter.recycled(), 1);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn asynchronous_flow_times_out_close_to_its_deadline() {
    const T: Duration = Duration::from_millis(60);
    let model = FloorModel::new().default_team("workers").namespace(
        NamespaceModel::new("jobs").function(
            FunctionModel::new("start")
                .asynchronous_timeout(T)
                .body(|ctx| {
                    let _never_completed = ctx.asynchronous_flow();
                    Ok(None)
                }),
        ),
    );
    let floor = passive(fast(), &model);

    let started = Instant::now();
    let handle = floor.invoke("jobs", "start", None).unwrap();
    let failure = handle.wait().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(failure.is(&CauseType::timeout()), "{failure}");
    assert!(elapsed >= T, "{elapsed:?}");
    assert!(elapsed < T + Duration::from_millis(500), "{elapsed:?}");
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_asynchronous_flow_lets_the_job_finish() {
    let log = Log::default();
    let l = log.clone();
    let model = FloorModel::new().default_team("pool").namespace(
        NamespaceModel::new("jobs")
            .function(
                FunctionModel::new("start")
                    .flow(FlowModel::asynchronous("audit", "audit").timeout(Duration::from_secs(5)))
                    .next("finish")
                    .body(|ctx| {
                        let handle = ctx.flow("audit", None)?;
                        assert!(handle.is_some());
                        Ok(None)
                    }),
            )
            .function(FunctionModel::new("audit").body(move |_ctx| {
                std::thread::sleep(Duration::from_millis(20));
                l.push("audit");
                Ok(None)
            }))
            .function(logged("finish", &log)),
    );
    let floor = FloorBuilder::new(fast())
        .with_team("pool", Arc::new(ThreadPoolTeam::new("pool", 2).unwrap()))
        .build(&model)
        .unwrap();

    floor.invoke("jobs", "start", None).unwrap().wait().await.unwrap();

    assert_eq!(log.entries(), ["audit", "finish"]);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn most_specific_handler_wins_across_scopes() {
    let io = CauseType::new("IOFailure");
    let not_found = CauseType::extending("FileNotFound", [io.clone()]);
    let log = Log::default();

    let handler = |name: &'static str, log: &Log| {
        let log = log.clone();
        FunctionModel::new(name).body(move |ctx| {
            let cause = ctx.escalation().map(|e| e.cause().name().to_string()).unwrap_or_default();
            log.push(format!("{name} {cause}"));
            Ok(None)
        })
    };
    let raising = {
        let io = io.clone();
        let not_found = not_found.clone();
        FunctionModel::new("read")
            .escalation(not_found.clone(), "inner")
            .body(move |ctx| {
                let missing = ctx.argument_as::<bool>().is_some_and(|m| *m);
                let cause = if missing { not_found.clone() } else { io.clone() };
                Err(Escalation::new(cause, "read failed"))
            })
    };
    let model = FloorModel::new()
        .default_team("workers")
        .escalation(io.clone(), "files.outer")
        .namespace(
            NamespaceModel::new("files")
                .function(raising)
                .function(handler("inner", &log))
                .function(handler("outer", &log)),
        );
    let floor = passive(fast(), &model);

    floor.invoke("files", "read", Some(payload(true))).unwrap().wait().await.unwrap();
    floor.invoke("files", "read", Some(payload(false))).unwrap().wait().await.unwrap();

    assert_eq!(log.entries(), ["inner FileNotFound", "outer IOFailure"]);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_escalations_move_strictly_outward() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let model = FloorModel::new()
        .default_team("workers")
        .escalation(CauseType::failure(), "ops.retry")
        .namespace(
            NamespaceModel::new("ops")
                .function(failing("run", CauseType::failure()))
                .function(FunctionModel::new("retry").body(move |_ctx| {
                    r.fetch_add(1, Ordering::SeqCst);
                    Err(Escalation::failure("retry failed too"))
                })),
        );
    let floor = passive(fast(), &model);

    let failure = floor.invoke("ops", "run", None).unwrap().wait().await.unwrap_err();

    assert_eq!(failure.message(), "retry failed too");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn floor_scope_spans_processes_and_process_scope_does_not() {
    let shared = Counter::default();
    let per_process = Counter::default();
    let model = FloorModel::new()
        .default_team("workers")
        .resource(shared.resource("config", Scope::Floor))
        .resource(per_process.resource("session", Scope::Process))
        .namespace(
            NamespaceModel::new("app").function(
                FunctionModel::new("handle")
                    .with_resource("config")
                    .with_resource("session")
                    .body(|_ctx| Ok(None)),
            ),
        );
    let floor = passive(fast(), &model);

    for _ in 0..2 {
        floor.invoke("app", "handle", None).unwrap().wait().await.unwrap();
    }
    assert_eq!((shared.created(), shared.recycled()), (1, 0));
    assert_eq!((per_process.created(), per_process.recycled()), (2, 2));

    floor.shutdown().await.unwrap();
    assert_eq!(shared.recycled(), 1);
}

struct Tx(Log);

impl Governance for Tx {
    fn govern(&mut self, extension: Payload) -> Result<(), Escalation> {
        let value = extension.downcast_ref::<u32>().copied().unwrap_or_default();
        self.0.push(format!("govern {value}"));
        Ok(())
    }

    fn enforce(&mut self) -> Result<(), Escalation> {
        self.0.push("enforce");
        Ok(())
    }

    fn disregard(&mut self) {
        self.0.push("disregard");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn governance_is_enforced_on_success_and_disregarded_on_failure() {
    let journal = Log::default();
    let j = journal.clone();
    let model = FloorModel::new()
        .default_team("workers")
        .resource(Counter::default().resource("db", Scope::Process).governed_by("tx"))
        .governance(GovernanceModel::new("tx").factory(GovernanceFn::arc(move || Tx(j.clone()))))
        .namespace(
            NamespaceModel::new("bank")
                .function(FunctionModel::new("deposit").with_resource("db").body(|_ctx| Ok(None)))
                .function(failing("withdraw", CauseType::failure()).with_resource("db")),
        );
    let floor = passive(fast(), &model);
    let mut events = floor.bus().subscribe();

    floor.invoke("bank", "deposit", None).unwrap().wait().await.unwrap();
    assert_eq!(journal.entries(), ["govern 42", "enforce"]);

    floor.invoke("bank", "withdraw", None).unwrap().wait().await.unwrap_err();
    assert_eq!(journal.entries(), ["govern 42", "enforce", "govern 42", "disregard"]);

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::GovernanceActivated));
    assert!(kinds.contains(&EventKind::GovernanceEnforced));
    assert!(kinds.contains(&EventKind::GovernanceDisregarded));
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duties_wrap_the_body_and_see_administered_extensions() {
    let log = Log::default();
    let l = log.clone();
    let journaled = ResourceFn::new(|_ctx| {
        Ok(Sourced::ready(
            SimpleResource::new(payload("conn")).with_extension("journal", payload("audit-log")),
        ))
    })
    .with_extensions(&["journal"]);
    let db = ResourceModel::new("db", Scope::Process).factory(Arc::new(journaled));
    let admin = AdministrationModel::new("audit")
        .extension("journal")
        .administers("db")
        .provider(AdministrationFn::arc(move |duty, ctx| {
            let journal = ctx.extension_as::<&str>(0).map(|j| *j).unwrap_or("none");
            l.push(format!("{duty} {} {journal}", ctx.function()));
            Ok(())
        }))
        .duty(DutyModel::new("before"))
        .duty(DutyModel::new("after"));
    let model = FloorModel::new()
        .default_team("workers")
        .resource(db)
        .administration(admin)
        .namespace(
            NamespaceModel::new("bank").function(
                logged("transfer", &log)
                    .with_resource("db")
                    .pre_duty("audit", "before")
                    .post_duty("audit", "after"),
            ),
        );
    let floor = passive(fast(), &model);

    floor.invoke("bank", "transfer", None).unwrap().wait().await.unwrap();

    assert_eq!(
        log.entries(),
        ["before bank.transfer audit-log", "transfer", "after bank.transfer audit-log"]
    );
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn recycle_failures_are_collected_without_failing_the_process() {
    let broken = |name: &str| {
        ResourceModel::new(name, Scope::Function).factory(ResourceFn::arc(|ctx| {
            let name = ctx.name().to_string();
            Ok(Sourced::ready(SimpleResource::new(payload(())).on_recycle(move || {
                Err(Escalation::failure(format!("{name} would not close")))
            })))
        }))
    };
    let model = FloorModel::new()
        .default_team("workers")
        .resource(broken("a"))
        .resource(broken("b"))
        .namespace(
            NamespaceModel::new("io")
                .function(FunctionModel::new("copy").with_resource("a").with_resource("b").body(|_ctx| Ok(None))),
        );
    let floor = passive(fast(), &model);

    let handle = floor.invoke("io", "copy", None).unwrap();
    handle.wait().await.unwrap();

    let cleanup = handle.cleanup_escalations();
    assert_eq!(cleanup.len(), 2);
    assert!(cleanup[0].message().starts_with('b'), "recycled in reverse: {cleanup:?}");
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn namespace_state_lives_for_one_process() {
    let seen = Log::default();
    let s = seen.clone();
    let model = FloorModel::new().default_team("workers").namespace(
        NamespaceModel::new("cart")
            .state(|| 0_u32)
            .function(
                FunctionModel::new("add")
                    .next("total")
                    .body(|ctx| {
                        ctx.with_state(|n: &mut u32| *n += 2);
                        Ok(None)
                    }),
            )
            .function(FunctionModel::new("total").body(move |ctx| {
                let total = ctx.with_state(|n: &mut u32| *n).unwrap_or_default();
                s.push(total.to_string());
                Ok(None)
            })),
    );
    let floor = passive(fast(), &model);

    for _ in 0..2 {
        floor.invoke("cart", "add", None).unwrap().wait().await.unwrap();
    }
    assert_eq!(seen.entries(), ["2", "2"]);
    floor.shutdown().await.unwrap();
}

struct Closed;

impl Team for Closed {
    fn name(&self) -> &str {
        "closed"
    }

    fn assign(&self, _work: Work) -> Result<(), TeamError> {
        Err(TeamError::Stopped { team: "closed".into() })
    }

    fn shutdown(&self) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_team_escalates_instead_of_dropping_work() {
    let log = Log::default();
    let model = FloorModel::new()
        .default_team("workers")
        .escalation(CauseType::team_unavailable(), "ops.fallback")
        .namespace(
            NamespaceModel::new("ops")
                .function(FunctionModel::new("remote").team("closed").body(|_ctx| Ok(None)))
                .function(logged("fallback", &log)),
        );
    let floor = FloorBuilder::new(fast())
        .with_team("workers", Arc::new(PassiveTeam::new("workers")))
        .with_team("closed", Arc::new(Closed))
        .build(&model)
        .unwrap();

    floor.invoke("ops", "remote", None).unwrap().wait().await.unwrap();
    assert_eq!(log.entries(), ["fallback"]);
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_reports_stuck_processes_and_closes_the_floor() {
    let model = FloorModel::new().default_team("workers").namespace(
        NamespaceModel::new("jobs").function(FunctionModel::new("hang").body(|ctx| {
            let _forever = ctx.asynchronous_flow();
            Ok(None)
        })),
    );
    let cfg = FloorConfig {
        grace: Duration::from_millis(50),
        ..fast()
    };
    let floor = passive(cfg, &model);

    let handle = floor.invoke("jobs", "hang", None).unwrap();
    let err = floor.shutdown().await.unwrap_err();

    assert_eq!(
        err,
        RuntimeError::GraceExceeded {
            grace: Duration::from_millis(50),
            stuck: vec![handle.id()],
        }
    );
    assert!(!handle.is_complete());
    assert_eq!(floor.invoke("jobs", "hang", None).unwrap_err(), RuntimeError::FloorClosed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invoke_rejects_unknown_names_and_build_rejects_empty_models() {
    let model = FloorModel::new()
        .default_team("workers")
        .namespace(NamespaceModel::new("a").function(FunctionModel::new("f").body(|_ctx| Ok(None))));
    let floor = passive(fast(), &model);

    assert!(matches!(
        floor.invoke("b", "f", None),
        Err(RuntimeError::UnknownNamespace { .. })
    ));
    assert!(matches!(
        floor.invoke("a", "g", None),
        Err(RuntimeError::UnknownFunction { .. })
    ));
    floor.shutdown().await.unwrap();

    let empty = FloorBuilder::new(fast()).build(&FloorModel::new());
    assert!(matches!(empty, Err(RuntimeError::NothingBound { issues: 1 })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_concurrent_processes_share_one_floor_resource() {
    let r = Counter::default();
    let done = Log::default();
    let d = done.clone();
    let model = FloorModel::new()
        .default_team("pool")
        .resource(r.resource("R", Scope::Floor))
        .namespace(
            NamespaceModel::new("app")
                .function(
                    FunctionModel::new("f1")
                        .flow(FlowModel::sequential("then", "f2"))
                        .body(|ctx| {
                            ctx.flow("then", None)?;
                            Ok(None)
                        }),
                )
                .function(FunctionModel::new("f2").with_resource("R").body(move |ctx| {
                    assert_eq!(ctx.resource_as::<u32>(0).map(|v| *v), Some(42));
                    std::thread::sleep(Duration::from_millis(20));
                    d.push("f2");
                    Ok(None)
                })),
        );
    let floor = pooled(&model, None);

    let first = floor.invoke("app", "f1", None).unwrap();
    let second = floor.invoke("app", "f1", None).unwrap();
    first.wait().await.unwrap();
    second.wait().await.unwrap();

    assert_eq!(done.entries(), ["f2", "f2"]);
    assert_eq!((r.created(), r.recycled()), (1, 0));
    floor.shutdown().await.unwrap();
    assert_eq!(r.recycled(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn monitors_forget_assets_of_finished_processes() {
    let counter = Counter::default();
    let model = FloorModel::new()
        .default_team("workers")
        .resource(counter.resource("session", Scope::Process))
        .namespace(
            NamespaceModel::new("app")
                .function(FunctionModel::new("handle").with_resource("session").body(|_ctx| Ok(None)))
                .function(
                    FunctionModel::new("stall")
                        .asynchronous_timeout(Duration::from_millis(10))
                        .body(|ctx| {
                            let _abandoned = ctx.asynchronous_flow();
                            Ok(None)
                        }),
                ),
        );
    let floor = passive(fast(), &model);

    for _ in 0..20 {
        floor.invoke("app", "handle", None).unwrap().wait().await.unwrap();
    }
    for _ in 0..5 {
        let failure = floor.invoke("app", "stall", None).unwrap().wait().await.unwrap_err();
        assert!(failure.is(&CauseType::timeout()), "{failure}");
    }

    assert_eq!((counter.created(), counter.recycled()), (20, 20));
    assert_eq!(tracked_assets(&floor), 0);
    floor.shutdown().await.unwrap();
}

#[derive(Clone, Default)]
struct WorkerNames(Log);

impl EscalationHandler for WorkerNames {
    fn unhandled(&self, _process: u64, _escalation: &Escalation) {
        let name = std::thread::current().name().unwrap_or("unnamed").to_string();
        self.0.push(name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timed_out_job_resumes_on_its_own_team() {
    let names = WorkerNames::default();
    let model = FloorModel::new().default_team("pool").namespace(
        NamespaceModel::new("jobs").function(
            FunctionModel::new("start")
                .asynchronous_timeout(Duration::from_millis(20))
                .body(|ctx| {
                    let _never_completed = ctx.asynchronous_flow();
                    Ok(None)
                }),
        ),
    );
    let floor = pooled(&model, Some(Arc::new(names.clone())));

    let failure = floor.invoke("jobs", "start", None).unwrap().wait().await.unwrap_err();

    assert!(failure.is(&CauseType::timeout()), "{failure}");
    let seen = names.0.entries();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("pool-"), "{seen:?}");
    floor.shutdown().await.unwrap();
}

struct Stubborn;

impl Governance for Stubborn {
    fn govern(&mut self, _extension: Payload) -> Result<(), Escalation> {
        Ok(())
    }

    fn enforce(&mut self) -> Result<(), Escalation> {
        Ok(())
    }

    fn disregard(&mut self) {
        panic!("rollback failed");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_disregard_still_completes_the_process() {
    let model = FloorModel::new()
        .default_team("pool")
        .resource(Counter::default().resource("db", Scope::Process).governed_by("tx"))
        .governance(GovernanceModel::new("tx").factory(GovernanceFn::arc(|| Stubborn)))
        .namespace(NamespaceModel::new("bank").function(failing("withdraw", CauseType::failure()).with_resource("db")));
    let floor = pooled(&model, None);

    let handle = floor.invoke("bank", "withdraw", None).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait()).await;

    let failure = outcome.expect("process completes").unwrap_err();
    assert_eq!(failure.message(), "boom");
    let cleanup = handle.cleanup_escalations();
    assert!(cleanup.iter().any(|e| e.message() == "rollback failed"), "{cleanup:?}");
    floor.shutdown().await.unwrap();
}

struct Exploding;

impl EscalationHandler for Exploding {
    fn unhandled(&self, _process: u64, _escalation: &Escalation) {
        panic!("handler exploded");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_default_handler_still_records_the_failure() {
    let model = FloorModel::new()
        .default_team("pool")
        .namespace(NamespaceModel::new("ops").function(failing("run", CauseType::failure())));
    let floor = pooled(&model, Some(Arc::new(Exploding)));

    let handle = floor.invoke("ops", "run", None).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle.wait()).await;

    assert_eq!(outcome.expect("process completes").unwrap_err().message(), "boom");
    let cleanup = handle.cleanup_escalations();
    assert_eq!(cleanup.len(), 1);
    assert_eq!(cleanup[0].message(), "handler exploded");
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn equally_specific_handlers_fail_the_process_as_ambiguous() {
    let left = CauseType::new("Left");
    let right = CauseType::new("Right");
    let both = CauseType::extending("Both", [left.clone(), right.clone()]);
    let log = Log::default();
    let model = FloorModel::new().default_team("workers").namespace(
        NamespaceModel::new("ops")
            .function(
                FunctionModel::new("read")
                    .escalation(left, "on_left")
                    .escalation(right, "on_right")
                    .body(move |_ctx| Err(Escalation::new(both.clone(), "split"))),
            )
            .function(logged("on_left", &log))
            .function(logged("on_right", &log)),
    );
    let floor = passive(fast(), &model);
    assert!(floor.issues().is_empty());

    let failure = floor.invoke("ops", "read", None).unwrap().wait().await.unwrap_err();

    assert!(failure.is(&CauseType::ambiguous()), "{failure}");
    assert!(log.entries().is_empty());
    assert!(floor.issues().mentions(AssetType::Function, "ops.read", "equally well"));
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn job_parks_until_a_pending_resource_is_ready() {
    let log = Log::default();
    let l = log.clone();
    let slow = ResourceModel::new("conn", Scope::Process).factory(ResourceFn::arc(|ctx| {
        let readiness = ctx.readiness();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            readiness.ready();
        });
        Ok(Sourced::pending(SimpleResource::new(payload("conn"))))
    }));
    let model = FloorModel::new().default_team("pool").resource(slow).namespace(
        NamespaceModel::new("db").function(FunctionModel::new("query").with_resource("conn").body(move |ctx| {
            let conn = ctx.resource_as::<&str>(0).map(|c| *c).unwrap_or("none");
            l.push(conn);
            Ok(None)
        })),
    );
    let floor = pooled(&model, None);
    let mut events = floor.bus().subscribe();

    floor.invoke("db", "query", None).unwrap().wait().await.unwrap();

    assert_eq!(log.entries(), ["conn"]);
    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    let parked = kinds.iter().position(|k| *k == EventKind::JobParked);
    let resumed = kinds.iter().position(|k| *k == EventKind::JobResumed);
    assert!(matches!((parked, resumed), (Some(p), Some(r)) if p < r), "{kinds:?}");
    floor.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resource_that_never_becomes_ready_times_out() {
    const T: Duration = Duration::from_millis(40);
    let recycled = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&recycled);
    let stuck = ResourceModel::new("conn", Scope::Process)
        .timeout(T)
        .factory(ResourceFn::arc(move |_ctx| {
            let r = Arc::clone(&r);
            Ok(Sourced::pending(SimpleResource::new(payload(())).on_recycle(move || {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })))
        }));
    let model = FloorModel::new().default_team("pool").resource(stuck).namespace(
        NamespaceModel::new("db").function(FunctionModel::new("query").with_resource("conn").body(|_ctx| Ok(None))),
    );
    let floor = pooled(&model, None);

    let started = Instant::now();
    let failure = floor.invoke("db", "query", None).unwrap().wait().await.unwrap_err();

    assert!(failure.is(&CauseType::timeout()), "{failure}");
    assert!(started.elapsed() >= T);
    assert_eq!(recycled.load(Ordering::SeqCst), 1);
    assert_eq!(tracked_assets(&floor), 0);
    floor.shutdown().await.unwrap();
}
