//! # Teams: pluggable worker pools that execute kernel work.
//!
//! A [`Team`] accepts boxed units of [`Work`] and runs them. The kernel never
//! cares which implementation it talks to; a function descriptor names its
//! team and the binder reports unknown names as issues.
//!
//! ## Implementations
//! - [`ThreadPoolTeam`] fixed number of threads pulling from one shared queue
//! - [`OnePersonTeam`] exactly one dedicated thread (isolation, blocking loops)
//! - [`PassiveTeam`] runs work on the caller's thread (deterministic tests)
//!
//! ```text
//! kernel ── assign(work) ──► Team ──► crossbeam queue ──► worker 1..N ──► work()
//!                              │
//!                              └── after shutdown: Err(TeamError::Stopped)
//! ```
//!
//! ## Rules
//! - `shutdown()` stops intake, drains queued work and joins the threads.
//! - A panic inside work is caught; the worker thread keeps serving.
//! - `shutdown()` must not be called from one of the team's own threads.

mod crew;
mod one_person;
mod passive;
mod pool;
mod registry;

pub use one_person::OnePersonTeam;
pub use passive::PassiveTeam;
pub use pool::ThreadPoolTeam;
pub use registry::TeamRegistry;

use crate::error::TeamError;

/// A unit of work handed to a team.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Worker-pool contract.
pub trait Team: Send + Sync + 'static {
    /// Human-readable name (for logs and thread names).
    fn name(&self) -> &str;

    /// Queues `work` for execution.
    ///
    /// Returns [`TeamError::Stopped`] once the team has been shut down; the
    /// work is dropped unexecuted in that case and the caller must react.
    fn assign(&self, work: Work) -> Result<(), TeamError>;

    /// Stops accepting work, drains what is queued and releases threads.
    ///
    /// Idempotent.
    fn shutdown(&self);
}
