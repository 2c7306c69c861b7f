//! # Cause types: the classification hierarchy for escalations.
//!
//! A [`CauseType`] is a named node in an inheritance graph. Every cause
//! extends [`CauseType::failure`] unless it names other parents explicitly, so
//! a handler registered for `Failure` catches everything.
//!
//! Matching is by inheritance **distance**: a handler for `IOFailure` matches
//! a `FileNotFound` raised as `FileNotFound -> IOFailure` at distance 1, and
//! an exact handler at distance 0 beats it.
//!
//! ```text
//!            Failure
//!          ┌────┴─────┬──────────┐
//!       Timeout   IOFailure   Panic ...
//!                     │
//!               FileNotFound
//! ```
//!
//! Equality and hashing are by name: two independently constructed cause
//! types with the same name are the same cause.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const FAILURE: &str = "Failure";

struct CauseInner {
    name: Cow<'static, str>,
    parents: Vec<CauseType>,
}

/// Named escalation classification with (possibly multiple) parents.
#[derive(Clone)]
pub struct CauseType(Arc<CauseInner>);

impl CauseType {
    /// Creates a cause type extending [`CauseType::failure`].
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        if name == FAILURE {
            return Self::failure();
        }
        Self::extending(name, [Self::failure()])
    }

    /// Creates a cause type with explicit parents.
    ///
    /// An empty parent list creates a new root that `Failure` handlers do not
    /// catch; prefer [`CauseType::new`] unless that is intended.
    pub fn extending(
        name: impl Into<Cow<'static, str>>,
        parents: impl IntoIterator<Item = CauseType>,
    ) -> Self {
        Self(Arc::new(CauseInner {
            name: name.into(),
            parents: parents.into_iter().collect(),
        }))
    }

    /// The root of the hierarchy.
    pub fn failure() -> Self {
        Self(Arc::new(CauseInner {
            name: Cow::Borrowed(FAILURE),
            parents: Vec::new(),
        }))
    }

    /// Raised when a parked waiter exceeds its readiness timeout.
    pub fn timeout() -> Self {
        Self::new("Timeout")
    }

    /// Raised when user code panics inside a job.
    pub fn panic() -> Self {
        Self::new("Panic")
    }

    /// Raised when more than one handler matches at equal specificity.
    pub fn ambiguous() -> Self {
        Self::new("Ambiguous")
    }

    /// Raised when a job cannot be assigned to its team.
    pub fn team_unavailable() -> Self {
        Self::new("TeamUnavailable")
    }

    /// Raised when a reference left unresolved at bind time is used.
    pub fn unresolved() -> Self {
        Self::new("Unresolved")
    }

    /// Raised when a managed resource cannot be sourced or used.
    pub fn resource_failure() -> Self {
        Self::new("ResourceFailure")
    }

    /// Returns the cause name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the direct parents.
    pub fn parents(&self) -> &[CauseType] {
        &self.0.parents
    }

    /// Inheritance distance from `self` up to `ancestor`.
    ///
    /// `Some(0)` for the same type, `None` if `ancestor` is not reachable.
    /// With multiple parents the shortest path counts.
    pub fn distance_to(&self, ancestor: &CauseType) -> Option<usize> {
        let mut queue: VecDeque<(&CauseType, usize)> = VecDeque::new();
        queue.push_back((self, 0));
        while let Some((current, depth)) = queue.pop_front() {
            if current == ancestor {
                return Some(depth);
            }
            for parent in current.parents() {
                queue.push_back((parent, depth + 1));
            }
        }
        None
    }

    /// Returns `true` if `self` is `ancestor` or inherits from it.
    #[inline]
    pub fn is_a(&self, ancestor: &CauseType) -> bool {
        self.distance_to(ancestor).is_some()
    }
}

impl PartialEq for CauseType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for CauseType {}

impl Hash for CauseType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for CauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for CauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_follows_the_shortest_path() {
        let io = CauseType::new("IOFailure");
        let missing = CauseType::new("Missing");
        let not_found = CauseType::extending("FileNotFound", [io.clone(), missing.clone()]);

        assert_eq!(not_found.distance_to(&not_found), Some(0));
        assert_eq!(not_found.distance_to(&io), Some(1));
        assert_eq!(not_found.distance_to(&missing), Some(1));
        assert_eq!(not_found.distance_to(&CauseType::failure()), Some(2));
        assert_eq!(io.distance_to(&not_found), None);
    }

    #[test]
    fn builtins_are_failures() {
        assert!(CauseType::timeout().is_a(&CauseType::failure()));
        assert_eq!(CauseType::new("Failure"), CauseType::failure());
        assert!(CauseType::failure().parents().is_empty());
    }
}
