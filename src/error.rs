//! Error types used by the taskfloor runtime.
//!
//! This module defines the kernel's non-escalation failures:
//!
//! - [`RuntimeError`]: errors raised by the process floor itself.
//! - [`TeamError`]: a team refused a unit of work.
//! - [`GovernanceError`]: the governance duty cycle was violated.
//!
//! Failures raised *inside* a process (resource activation, duties, function
//! bodies, timeouts) are not errors of this module: they are
//! [`Escalation`](crate::Escalation)s routed through the escalation procedure.
//!
//! All types provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the process floor.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The floor is shutting down and no longer accepts processes.
    #[error("process floor is closed")]
    FloorClosed,

    /// No namespace with this name was bound.
    #[error("unknown namespace '{namespace}'")]
    UnknownNamespace {
        /// The requested namespace name.
        namespace: String,
    },

    /// The namespace exists but has no function with this name.
    #[error("unknown function '{function}' in namespace '{namespace}'")]
    UnknownFunction {
        /// The namespace that was searched.
        namespace: String,
        /// The requested function name.
        function: String,
    },

    /// Binding produced no function at all; nothing could ever be invoked.
    #[error("configuration bound no functions ({issues} issues reported)")]
    NothingBound {
        /// Number of issues reported while binding.
        issues: usize,
    },

    /// Shutdown grace period was exceeded; some processes were still in flight.
    #[error("shutdown timeout {grace:?} exceeded; stuck processes: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Identifiers of processes that did not complete in time.
        stuck: Vec<u64>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskfloor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::FloorClosed.as_label(), "floor_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::FloorClosed => "floor_closed",
            RuntimeError::UnknownNamespace { .. } => "unknown_namespace",
            RuntimeError::UnknownFunction { .. } => "unknown_function",
            RuntimeError::NothingBound { .. } => "nothing_bound",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck processes={stuck:?}")
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced by a team.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TeamError {
    /// The team has been shut down and accepts no more work.
    #[error("team '{team}' is stopped")]
    Stopped {
        /// Team name.
        team: String,
    },
}

impl TeamError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TeamError::Stopped { .. } => "team_stopped",
        }
    }
}

/// # Errors produced by governance bookkeeping.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// A thread tried to complete while governances were still active
    /// (neither enforced nor disregarded).
    #[error("governance cycle incomplete; still active: {governances:?}")]
    CycleIncomplete {
        /// Names of the governances left active.
        governances: Vec<String>,
    },
}

impl GovernanceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GovernanceError::CycleIncomplete { .. } => "governance_cycle_incomplete",
        }
    }
}
