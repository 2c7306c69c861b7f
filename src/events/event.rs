//! # Kernel events.
//!
//! The [`EventKind`] enum classifies event types across five categories:
//! - **Process lifecycle**: process started / completed / failed
//! - **Job lifecycle**: starting, parked on a readiness monitor, resumed, completed
//! - **Resources & governance**: recycle, cleanup escalations, governance cycle steps
//! - **Escalation**: raised, handled, timeouts, issues
//! - **Floor / subscribers**: shutdown progress, subscriber overflow and panics
//!
//! The [`Event`] struct carries optional metadata (process id, subject name,
//! reason, timeout).
//!
//! ## Ordering guarantees
//! Each event receives a sequence number (`seq`) from the [`Bus`](super::Bus)
//! it is published on. Use `seq` to restore publish order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskfloor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TimeoutHit)
//!     .with_process(7)
//!     .with_subject("orders.load")
//!     .with_timeout(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::TimeoutHit);
//! assert_eq!(ev.subject.as_deref(), Some("orders.load"));
//! assert_eq!(ev.timeout_ms, Some(250));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Classification of kernel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subject`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subject`: subscriber name
    /// - `reason`: `"full"` or `"closed"`
    SubscriberOverflow,

    // === Floor events ===
    /// Floor shutdown requested; no new processes are accepted.
    ShutdownRequested,

    /// Every in-flight process completed within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some processes were still in flight.
    ///
    /// Sets:
    /// - `reason`: stuck process ids
    GraceExceeded,

    // === Process lifecycle ===
    /// A process was created by `invoke`.
    ///
    /// Sets:
    /// - `process`: process id
    /// - `subject`: qualified entry function name
    ProcessStarted,

    /// A process completed successfully (all of its threads finished).
    ///
    /// Sets:
    /// - `process`: process id
    ProcessCompleted,

    /// A process completed with an unhandled escalation.
    ///
    /// Sets:
    /// - `process`: process id
    /// - `reason`: the escalation
    ProcessFailed,

    // === Job lifecycle ===
    /// A job is leaving `Pending` (first time it is driven).
    ///
    /// Sets:
    /// - `process`, `subject`: qualified function name
    JobStarting,

    /// A job suspended on a readiness monitor.
    ///
    /// Sets:
    /// - `process`, `subject`: qualified function name
    /// - `reason`: the monitor name
    JobParked,

    /// A parked job was re-queued onto its team.
    ///
    /// Sets:
    /// - `process`, `subject`: qualified function name
    JobResumed,

    /// A job reached `Completed`.
    ///
    /// Sets:
    /// - `process`, `subject`: qualified function name
    JobCompleted,

    // === Resources & governance ===
    /// A scope recycled its managed resources.
    ///
    /// Sets:
    /// - `process` (absent for floor scope)
    /// - `reason`: scope and number of recycled resources
    ResourcesRecycled,

    /// Recycling a resource failed; collected, siblings still recycled.
    ///
    /// Sets:
    /// - `process`, `reason`: the cleanup escalation
    CleanupEscalation,

    /// A governance became active on a thread.
    ///
    /// Sets:
    /// - `process`, `subject`: governance name
    GovernanceActivated,

    /// A governance committed and detached its resources.
    GovernanceEnforced,

    /// A governance detached its resources without committing.
    GovernanceDisregarded,

    // === Escalation ===
    /// A job raised an escalation.
    ///
    /// Sets:
    /// - `process`, `subject`: qualified function name
    /// - `reason`: the escalation
    EscalationRaised,

    /// An escalation matched a handler; the handler job was queued.
    ///
    /// Sets:
    /// - `process`, `subject`: qualified handler name
    /// - `reason`: the escalation
    EscalationHandled,

    /// A parked waiter exceeded its readiness timeout.
    ///
    /// Sets:
    /// - `subject`: monitor name
    /// - `timeout_ms`: configured timeout
    TimeoutHit,

    /// A non-fatal issue was reported.
    ///
    /// Sets:
    /// - `subject`: asset name
    /// - `reason`: asset type and message
    IssueReported,
}

/// Kernel event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Sequence number assigned by the bus at publish time.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Process id, if the event belongs to a process.
    pub process: Option<u64>,
    /// Function, resource, governance, monitor or subscriber name.
    pub subject: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            process: None,
            subject: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_process(mut self, process: u64) -> Self {
        self.process = Some(process);
        self
    }

    /// Attaches a subject name.
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subject(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subject(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
