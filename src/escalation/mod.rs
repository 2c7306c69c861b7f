//! Escalations: the kernel's structured failure values.
//!
//! ## Contents
//! - [`CauseType`] classification hierarchy used for handler matching
//! - [`Escalation`] a raised failure (cause + message + optional source)
//! - [`EscalationTable`] per-scope `cause → handler` resolution
//!
//! ## Where escalations come from
//! ```text
//! resource activation ─┐
//! duty execution ──────┼──► Escalation ──► escalation procedure
//! function body ───────┤                    (function → governances → process → default)
//! readiness timeout ───┘
//! ```

mod cause;
mod table;

pub use cause::CauseType;
pub use table::{EscalationEntry, EscalationMatch, EscalationTable};

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A raised failure routed through the escalation procedure.
///
/// Cheap to clone: the message and source are shared.
#[derive(Error, Debug, Clone)]
#[error("{cause}: {message}")]
pub struct Escalation {
    cause: CauseType,
    message: Arc<str>,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Escalation {
    /// Creates an escalation of the given cause.
    pub fn new(cause: CauseType, message: impl Into<Arc<str>>) -> Self {
        Self {
            cause,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a plain [`CauseType::failure`] escalation.
    pub fn failure(message: impl Into<Arc<str>>) -> Self {
        Self::new(CauseType::failure(), message)
    }

    /// Creates a [`CauseType::timeout`] escalation.
    pub fn timeout(what: &str, timeout: Duration) -> Self {
        Self::new(
            CauseType::timeout(),
            format!("{what} not ready within {timeout:?}"),
        )
    }

    /// Creates a [`CauseType::unresolved`] escalation.
    pub fn unresolved(message: impl Into<Arc<str>>) -> Self {
        Self::new(CauseType::unresolved(), message)
    }

    /// Creates a [`CauseType::panic`] escalation from a caught panic payload.
    pub fn from_panic(panic: &(dyn std::any::Any + Send)) -> Self {
        Self::new(CauseType::panic(), crate::sync::panic_message(panic))
    }

    /// Attaches an underlying error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the cause.
    pub fn cause(&self) -> &CauseType {
        &self.cause
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the cause is `cause` or inherits from it.
    pub fn is(&self, cause: &CauseType) -> bool {
        self.cause.is_a(cause)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self.cause.name() {
            "Timeout" => "escalation_timeout",
            "Panic" => "escalation_panic",
            "Ambiguous" => "escalation_ambiguous",
            "TeamUnavailable" => "escalation_team_unavailable",
            "Unresolved" => "escalation_unresolved",
            "ResourceFailure" => "escalation_resource_failure",
            _ => "escalation",
        }
    }
}
