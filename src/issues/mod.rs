//! # Issue sink: the channel for non-fatal problems.
//!
//! Bind-time validation and run-time bookkeeping never throw past the kernel
//! boundary. Every problem becomes an [`Issue`] keyed by the asset it concerns
//! and handed to an [`IssueSink`].
//!
//! ## Implementations
//! - [`IssueCollector`] keeps issues in memory (tests, tooling).
//! - [`BusIssues`] republishes each issue as [`EventKind::IssueReported`].
//! - [`IssueFanout`] forwards to several sinks.
//!
//! ```text
//! Binder ───┐
//!           ├──► IssueSink::add_issue(asset_type, asset_name, message, cause)
//! Kernel ───┘          ├──► IssueCollector (Vec<Issue>)
//!                      └──► BusIssues ──► Bus ──► subscribers (LogWriter, ...)
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::events::{Bus, Event, EventKind};
use crate::sync::lock;

/// Kind of asset an issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Floor,
    Team,
    Namespace,
    Function,
    Flow,
    Resource,
    Administration,
    Duty,
    Governance,
    Escalation,
    Process,
}

impl AssetType {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Floor => "floor",
            AssetType::Team => "team",
            AssetType::Namespace => "namespace",
            AssetType::Function => "function",
            AssetType::Flow => "flow",
            AssetType::Resource => "resource",
            AssetType::Administration => "administration",
            AssetType::Duty => "duty",
            AssetType::Governance => "governance",
            AssetType::Escalation => "escalation",
            AssetType::Process => "process",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Kind of the offending asset.
    pub asset_type: AssetType,
    /// Name (or positional identifier) of the offending asset.
    pub asset_name: String,
    /// What is wrong.
    pub message: String,
    /// Rendered cause, if one was supplied.
    pub cause: Option<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.asset_type, self.asset_name, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

/// Receiver of non-fatal problems.
pub trait IssueSink: Send + Sync {
    /// Records an issue about `asset_name` of kind `asset_type`.
    fn add_issue(
        &self,
        asset_type: AssetType,
        asset_name: &str,
        message: &str,
        cause: Option<&(dyn StdError + 'static)>,
    );
}

/// In-memory sink.
#[derive(Default)]
pub struct IssueCollector {
    issues: Mutex<Vec<Issue>>,
}

impl IssueCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn issues(&self) -> Vec<Issue> {
        lock(&self.issues).clone()
    }

    /// Returns the number of recorded issues.
    pub fn len(&self) -> usize {
        lock(&self.issues).len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.issues).is_empty()
    }

    /// Returns `true` if an issue for this asset contains `fragment`.
    pub fn mentions(&self, asset_type: AssetType, asset_name: &str, fragment: &str) -> bool {
        lock(&self.issues).iter().any(|i| {
            i.asset_type == asset_type && i.asset_name == asset_name && i.message.contains(fragment)
        })
    }
}

impl IssueSink for IssueCollector {
    fn add_issue(
        &self,
        asset_type: AssetType,
        asset_name: &str,
        message: &str,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        lock(&self.issues).push(Issue {
            asset_type,
            asset_name: asset_name.to_string(),
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        });
    }
}

/// Sink that republishes issues on the event bus.
pub struct BusIssues {
    bus: Bus,
}

impl BusIssues {
    /// Creates a sink publishing to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }
}

impl IssueSink for BusIssues {
    fn add_issue(
        &self,
        asset_type: AssetType,
        asset_name: &str,
        message: &str,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        let reason = match cause {
            Some(c) => format!("{asset_type}: {message} ({c})"),
            None => format!("{asset_type}: {message}"),
        };
        self.bus.publish(
            Event::new(EventKind::IssueReported)
                .with_subject(asset_name)
                .with_reason(reason),
        );
    }
}

/// Sink forwarding every issue to each inner sink in order.
#[derive(Default)]
pub struct IssueFanout {
    sinks: Vec<Arc<dyn IssueSink>>,
}

impl IssueFanout {
    /// Creates a fan-out over `sinks`.
    pub fn new(sinks: Vec<Arc<dyn IssueSink>>) -> Self {
        Self { sinks }
    }
}

impl IssueSink for IssueFanout {
    fn add_issue(
        &self,
        asset_type: AssetType,
        asset_name: &str,
        message: &str,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        for sink in &self.sinks {
            sink.add_issue(asset_type, asset_name, message, cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_records_cause_text() {
        let sink = IssueCollector::new();
        let io = std::io::Error::other("denied");
        sink.add_issue(AssetType::Resource, "db", "failed to open", Some(&io));

        let issues = sink.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].cause.as_deref(), Some("denied"));
        assert_eq!(issues[0].to_string(), "resource 'db': failed to open (denied)");
        assert!(sink.mentions(AssetType::Resource, "db", "open"));
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(IssueCollector::new());
        let b = Arc::new(IssueCollector::new());
        let fanout = IssueFanout::new(vec![a.clone(), b.clone()]);
        fanout.add_issue(AssetType::Team, "io", "missing", None);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
