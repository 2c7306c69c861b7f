//! Kernel events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the process floor, worker threads,
//! readiness monitoring and the binder's issue sink.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ProcessFloor`, job drivers on team threads, the readiness
//!   ticker, `BusIssues`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the floor's listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
