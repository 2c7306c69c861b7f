//! # taskfloor
//!
//! **taskfloor** is an embeddable execution kernel. It binds a declarative
//! model of namespaces, functions, flows and managed resources into
//! immutable descriptors, then runs *processes* over them on worker pools
//! ("teams"), parking jobs instead of threads while resources load or
//! asynchronous flows complete.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   FloorModel (names only)
//!        │
//!        ▼
//! ┌──────────────────────┐   issues   ┌──────────────────────────────┐
//! │ bind (two passes)    │──────────► │ IssueSink (collector, bus)   │
//! │  1. construct        │            └──────────────────────────────┘
//! │  2. link by name     │
//! └──────────┬───────────┘
//!            ▼ Descriptors (indices, no names at runtime)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │ ProcessFloor                                                      │
//! │  - TeamRegistry        (ThreadPoolTeam / OnePersonTeam / Passive) │
//! │  - ReadinessMonitors   (resource, function, flow assets)          │
//! │  - floor-scoped resources                                         │
//! │  - Bus ──► SubscriberSet ──► LogWriter, user subscribers          │
//! └──────┬──────────────────────────────┬─────────────────────────────┘
//!        │ invoke(ns, function, arg)    │ timeout ticker
//!        ▼                              ▼
//!   ProcessState ──► ThreadState ──► Job stack ──► stages on teams
//! ```
//!
//! ### Job lifecycle
//! ```text
//! Pending ─► LoadingResources ─► Governing ─► PreDuties ─► Executing
//!                 │ (park)                                    │
//!                 ▼                                           ▼
//!          ReadinessMonitor                    PostDuties ─► AwaitingFlows ─► Completed
//!                                                              │ (park)
//! any stage ── Escalation ──► function table ─► governances ─► process table ─► default handler
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types                                   |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Binding**       | Two-pass name resolution with non-fatal, batched issues       | [`FloorModel`], [`bind`], [`Descriptors`]   |
//! | **Execution**     | Jobs staged across teams, parked on readiness                 | [`ProcessFloor`], [`FunctionContext`]       |
//! | **Resources**     | Scoped single-flight activation, reverse-order recycling      | [`ResourceFactory`], [`Scope`]              |
//! | **Governance**    | Activate / attach / enforce / disregard duty cycle            | [`Governance`], [`GovernanceFactory`]       |
//! | **Escalation**    | Typed causes, most-specific match, outward propagation        | [`Escalation`], [`CauseType`]               |
//! | **Observability** | Event bus with isolated subscribers and `tracing` output      | [`Event`], [`Subscribe`], [`LogWriter`]     |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskfloor::{
//!     FloorBuilder, FloorConfig, FloorModel, FlowModel, FunctionModel, NamespaceModel,
//!     ThreadPoolTeam, payload,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = FloorModel::new().default_team("workers").namespace(
//!         NamespaceModel::new("orders")
//!             .function(
//!                 FunctionModel::new("receive")
//!                     .flow(FlowModel::sequential("check", "validate"))
//!                     .next("store")
//!                     .body(|ctx| {
//!                         let order = ctx.argument().cloned();
//!                         ctx.flow("check", order)?;
//!                         Ok(Some(payload("order-1")))
//!                     }),
//!             )
//!             .function(FunctionModel::new("validate").body(|_ctx| Ok(None)))
//!             .function(FunctionModel::new("store").body(|_ctx| Ok(None))),
//!     );
//!
//!     let floor = FloorBuilder::new(FloorConfig::default())
//!         .with_team("workers", Arc::new(ThreadPoolTeam::new("workers", 2)?))
//!         .build(&model)?;
//!
//!     floor.invoke("orders", "receive", None)?.wait().await?;
//!     floor.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod administration;
mod bind;
mod config;
mod core;
mod error;
mod escalation;
mod events;
mod governance;
mod issues;
mod meta;
mod model;
mod monitor;
mod payload;
mod resources;
mod subscribers;
mod sync;
mod teams;

pub use administration::{Administration, AdministrationFn};
pub use bind::bind;
pub use config::FloorConfig;
pub use crate::core::{
    AsynchronousHandle, DutyContext, EscalationHandler, FloorBuilder, FunctionBody, FunctionContext, JobStage,
    LogEscalations, ProcessFloor, ProcessHandle,
};
pub use error::{GovernanceError, RuntimeError, TeamError};
pub use escalation::{CauseType, Escalation, EscalationEntry, EscalationMatch, EscalationTable};
pub use events::{Bus, Event, EventKind};
pub use governance::{Governance, GovernanceFactory, GovernanceFn};
pub use issues::{AssetType, BusIssues, Issue, IssueCollector, IssueFanout, IssueSink};
pub use meta::{
    AdministrationMeta, DescriptorOutline, Descriptors, DutyMeta, DutyRef, FlowInterface, FlowInterfaceEntry,
    FlowMeta, FunctionMeta, GovernanceMeta, NamespaceMeta, ParameterMeta, ResourceMeta, Strategy,
};
pub use model::{
    AdministrationModel, DutyModel, EscalationModel, FloorModel, FlowModel, FunctionModel, GovernanceModel,
    NamespaceModel, ParameterModel, ResourceModel, StateFactory,
};
pub use monitor::AssetKey;
pub use payload::{Payload, downcast, payload};
pub use resources::{
    CleanupEscalations, ManagedResource, ResourceContext, ResourceFactory, ResourceFn, ResourceReadiness, Scope,
    SimpleResource, Sourced,
};
pub use subscribers::{LogWriter, Subscribe};
pub use teams::{OnePersonTeam, PassiveTeam, Team, TeamRegistry, ThreadPoolTeam, Work};
