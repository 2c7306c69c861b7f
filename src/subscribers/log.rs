//! # Logging subscriber.
//!
//! [`LogWriter`] forwards kernel events to [`tracing`] with one structured
//! record per event. Install any `tracing` subscriber in the host to see them.
//!
//! Failures (`ProcessFailed`, `GraceExceeded`, `SubscriberPanicked`) log at
//! `warn`/`error`; job-level chatter logs at `debug`/`trace`.
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use taskfloor::{FloorBuilder, FloorConfig, LogWriter};
//! let builder = FloorBuilder::new(FloorConfig::default())
//!     .with_subscribers(vec![Arc::new(LogWriter)]);
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber writing every event through `tracing` macros.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let process = e.process.unwrap_or(0);
        let subject = e.subject.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ProcessStarted => {
                info!(seq = e.seq, process, entry = subject, "process started")
            }
            EventKind::ProcessCompleted => info!(seq = e.seq, process, "process completed"),
            EventKind::ProcessFailed => {
                warn!(seq = e.seq, process, escalation = reason, "process failed")
            }
            EventKind::JobStarting => trace!(seq = e.seq, process, function = subject, "job starting"),
            EventKind::JobParked => {
                trace!(seq = e.seq, process, function = subject, monitor = reason, "job parked")
            }
            EventKind::JobResumed => trace!(seq = e.seq, process, function = subject, "job resumed"),
            EventKind::JobCompleted => {
                debug!(seq = e.seq, process, function = subject, "job completed")
            }
            EventKind::ResourcesRecycled => debug!(seq = e.seq, process, scope = reason, "recycled"),
            EventKind::CleanupEscalation => {
                warn!(seq = e.seq, process, escalation = reason, "cleanup escalation")
            }
            EventKind::GovernanceActivated => {
                debug!(seq = e.seq, process, governance = subject, "governance activated")
            }
            EventKind::GovernanceEnforced => {
                debug!(seq = e.seq, process, governance = subject, "governance enforced")
            }
            EventKind::GovernanceDisregarded => {
                debug!(seq = e.seq, process, governance = subject, "governance disregarded")
            }
            EventKind::EscalationRaised => {
                info!(seq = e.seq, process, function = subject, escalation = reason, "escalation raised")
            }
            EventKind::EscalationHandled => {
                info!(seq = e.seq, process, handler = subject, escalation = reason, "escalation handled")
            }
            EventKind::TimeoutHit => {
                warn!(seq = e.seq, monitor = subject, timeout_ms = ?e.timeout_ms, "timeout hit")
            }
            EventKind::IssueReported => warn!(seq = e.seq, asset = subject, issue = reason, "issue"),
            EventKind::ShutdownRequested => info!(seq = e.seq, "shutdown requested"),
            EventKind::AllStoppedWithin => info!(seq = e.seq, "all processes completed within grace"),
            EventKind::GraceExceeded => error!(seq = e.seq, stuck = reason, "grace exceeded"),
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, subscriber = subject, panic = reason, "subscriber panicked")
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = subject, reason, "subscriber dropped event")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
