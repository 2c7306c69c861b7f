//! # Managed resources: scoped, lifecycle-managed dependencies.
//!
//! Functions declare the resources they need; the kernel activates each one
//! at most once per [`Scope`] instance, parks jobs while a resource loads,
//! and recycles everything when the scope ends.
//!
//! ## Contents
//! - [`ResourceFactory`] / [`ManagedResource`] the user-facing interface
//! - [`ResourceSlot`] single-flight activation of one instance
//! - [`ResourceContainer`] the slots of one scope instance, recycled in reverse
//! - [`CleanupEscalations`] recycle-time failures, collected as a batch
//!
//! ```text
//! job ──activate──► ResourceSlot ──create──► ResourceFactory
//!                       │  Pending(asset)
//!                       └──────────► ReadinessMonitor ◄── ResourceReadiness::ready()
//! ```

mod cleanup;
mod container;
mod factory;
mod slot;

pub use cleanup::CleanupEscalations;
pub use container::ResourceContainer;
pub use factory::{
    ManagedResource, ResourceContext, ResourceFactory, ResourceFn, ResourceReadiness,
    SimpleResource, Sourced,
};
pub use slot::{Activation, ResourceSlot};

use std::fmt;

/// Lifetime of a resource instance, narrowest first.
///
/// A binding may depend only on bindings of the same or a wider scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// One instance per job.
    Function,
    /// One instance per thread state.
    Thread,
    /// One instance per namespace per process.
    Namespace,
    /// One instance per process.
    Process,
    /// One instance shared by every process on the floor.
    Floor,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Function => "function",
            Scope::Thread => "thread",
            Scope::Namespace => "namespace",
            Scope::Process => "process",
            Scope::Floor => "floor",
        }
    }

    /// `true` if an instance of `self` may depend on an instance of `other`.
    #[inline]
    pub fn may_depend_on(&self, other: Scope) -> bool {
        other >= *self
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
