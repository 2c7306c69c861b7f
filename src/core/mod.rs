//! Runtime core: processes, threads, jobs and the escalation procedure.
//!
//! The only public entry points are [`FloorBuilder`] and [`ProcessFloor`];
//! user code meets the kernel through [`FunctionContext`] and
//! [`DutyContext`].
//!
//! Internal modules:
//! - [`floor`]: shared floor state, process admission, shutdown;
//! - [`thread`]: the job stage machine and team hopping;
//! - [`escalate`]: handler lookup from function scope outward;
//! - [`process`]: process-scoped resources, state and completion;
//! - [`signals`]: cross-platform termination signals.

mod builder;
mod context;
mod escalate;
mod floor;
mod handle;
mod job;
mod process;
mod signals;
mod thread;

#[cfg(test)]
mod tests;

pub use builder::FloorBuilder;
pub use context::{AsynchronousHandle, DutyContext, FunctionBody, FunctionContext};
pub use floor::{EscalationHandler, LogEscalations, ProcessFloor};
pub use handle::ProcessHandle;
pub use job::JobStage;
