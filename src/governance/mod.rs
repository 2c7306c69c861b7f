//! # Governance: scoped supervision over managed resources.
//!
//! A governance binding names a [`GovernanceFactory`]. The first function on
//! a thread that needs the governance *activates* it: a fresh [`Governance`]
//! instance is created and the extensions of the resources it governs are
//! attached through [`Governance::govern`]. The instance then lives on the
//! thread's [`ActiveGovernances`] stack until exactly one of:
//!
//! - **enforce**: commit over everything attached, then detach;
//! - **disregard**: detach without committing (the scope is escalating).
//!
//! ```text
//!   activate ──► govern(ext)* ──┬──► enforce()     (thread moves on / completes)
//!                               └──► disregard()   (escalation passes through)
//! ```
//!
//! [`ActiveGovernances::complete`] checks the duty cycle: a thread may not
//! complete while a governance is still active.
//!
//! `disregard` runs while an escalation is already in flight, so it cannot
//! fail; a panic inside it is recorded as a cleanup escalation.
//!
//! ## Example
//! ```rust
//! use taskfloor::{Escalation, Governance, GovernanceFn, Payload};
//!
//! struct Transaction { enlisted: usize }
//!
//! impl Governance for Transaction {
//!     fn govern(&mut self, _ext: Payload) -> Result<(), Escalation> {
//!         self.enlisted += 1;
//!         Ok(())
//!     }
//!     fn enforce(&mut self) -> Result<(), Escalation> {
//!         Ok(()) // commit
//!     }
//! }
//!
//! let factory = GovernanceFn::arc(|| Transaction { enlisted: 0 });
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::GovernanceError;
use crate::escalation::Escalation;
use crate::payload::Payload;
use crate::resources::CleanupEscalations;

/// A live governance instance bound to one thread.
pub trait Governance: Send + 'static {
    /// Attaches the extension of a governed resource.
    fn govern(&mut self, extension: Payload) -> Result<(), Escalation>;

    /// Commits over all attached resources.
    fn enforce(&mut self) -> Result<(), Escalation>;

    /// Drops attached resources without committing.
    fn disregard(&mut self) {}
}

/// Creates governance instances.
pub trait GovernanceFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn Governance>;
}

/// Factory backed by a closure.
pub struct GovernanceFn<F> {
    f: F,
}

impl<F, G> GovernanceFn<F>
where
    F: Fn() -> G + Send + Sync + 'static,
    G: Governance,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<dyn GovernanceFactory> {
        Arc::new(Self::new(f))
    }
}

impl<F, G> GovernanceFactory for GovernanceFn<F>
where
    F: Fn() -> G + Send + Sync + 'static,
    G: Governance,
{
    fn create(&self) -> Box<dyn Governance> {
        Box::new((self.f)())
    }
}

/// One active governance on a thread.
struct ActiveGovernance {
    index: usize,
    name: Arc<str>,
    instance: Box<dyn Governance>,
}

/// The stack of governances active on one thread, outermost first.
#[derive(Default)]
pub struct ActiveGovernances {
    stack: Vec<ActiveGovernance>,
}

impl ActiveGovernances {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.position(index).is_some()
    }

    /// Stack position of governance `index` (0 = outermost).
    pub fn position(&self, index: usize) -> Option<usize> {
        self.stack.iter().position(|g| g.index == index)
    }

    /// Binding indices, innermost first.
    pub fn innermost_first(&self) -> impl Iterator<Item = usize> + '_ {
        self.stack.iter().rev().map(|g| g.index)
    }

    /// Activates governance `index` unless already active.
    ///
    /// Returns `true` if a new instance was created.
    pub fn activate(&mut self, index: usize, name: Arc<str>, factory: &dyn GovernanceFactory) -> bool {
        if self.is_active(index) {
            return false;
        }
        self.stack.push(ActiveGovernance {
            index,
            name,
            instance: factory.create(),
        });
        true
    }

    /// Attaches a governed resource's extension to active governance `index`.
    pub fn attach(&mut self, index: usize, extension: Payload) -> Result<(), Escalation> {
        let Some(pos) = self.position(index) else {
            return Err(Escalation::unresolved(format!(
                "governance #{index} is not active"
            )));
        };
        self.stack[pos].instance.govern(extension)
    }

    /// Enforces and removes governance `index`.
    ///
    /// The governance is removed even if enforcing fails.
    pub fn enforce(&mut self, index: usize) -> Option<(Arc<str>, Result<(), Escalation>)> {
        let pos = self.position(index)?;
        let mut active = self.stack.remove(pos);
        let outcome = active.instance.enforce();
        Some((active.name, outcome))
    }

    /// Disregards governances at stack position `from` and everything inner.
    ///
    /// Returns the disregarded names, innermost first. A panicking
    /// `disregard` is pushed to `cleanup`; the remaining ones still run.
    pub fn disregard_from(&mut self, from: usize, cleanup: &mut CleanupEscalations) -> Vec<Arc<str>> {
        if from >= self.stack.len() {
            return Vec::new();
        }
        self.stack
            .drain(from..)
            .rev()
            .map(|mut active| {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| active.instance.disregard())) {
                    cleanup.push(Escalation::from_panic(&*panic));
                }
                active.name
            })
            .collect()
    }

    /// Checks the duty cycle: fails if anything is still active.
    pub fn complete(&self) -> Result<(), GovernanceError> {
        if self.stack.is_empty() {
            return Ok(());
        }
        Err(GovernanceError::CycleIncomplete {
            governances: self.stack.iter().map(|g| g.name.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::payload;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    struct Tx {
        name: &'static str,
        journal: Journal,
    }

    impl Governance for Tx {
        fn govern(&mut self, ext: Payload) -> Result<(), Escalation> {
            let n = ext.downcast_ref::<&str>().copied().unwrap_or("?");
            self.journal.0.lock().unwrap().push(format!("{} govern {n}", self.name));
            Ok(())
        }
        fn enforce(&mut self) -> Result<(), Escalation> {
            self.journal.0.lock().unwrap().push(format!("{} enforce", self.name));
            Ok(())
        }
        fn disregard(&mut self) {
            self.journal.0.lock().unwrap().push(format!("{} disregard", self.name));
        }
    }

    fn factory(name: &'static str, journal: &Journal) -> Arc<dyn GovernanceFactory> {
        let journal = journal.clone();
        GovernanceFn::arc(move || Tx {
            name,
            journal: journal.clone(),
        })
    }

    #[test]
    fn thread_completing_with_active_governance_breaks_the_cycle() {
        let journal = Journal::default();
        let mut active = ActiveGovernances::new();
        active.activate(0, "tx".into(), factory("tx", &journal).as_ref());
        active.attach(0, payload("R")).unwrap();

        let err = active.complete().unwrap_err();
        assert_eq!(
            err,
            GovernanceError::CycleIncomplete {
                governances: vec!["tx".into()]
            }
        );

        let (name, outcome) = active.enforce(0).unwrap();
        assert_eq!(&*name, "tx");
        assert!(outcome.is_ok());
        assert!(active.complete().is_ok());
        assert_eq!(*journal.0.lock().unwrap(), vec!["tx govern R", "tx enforce"]);
    }

    #[test]
    fn disregard_from_detaches_inner_governances_first() {
        let journal = Journal::default();
        let mut active = ActiveGovernances::new();
        for (i, name) in ["outer", "middle", "inner"].into_iter().enumerate() {
            assert!(active.activate(i, name.into(), factory(name, &journal).as_ref()));
        }
        assert!(!active.activate(1, "middle".into(), factory("middle", &journal).as_ref()));
        assert_eq!(active.innermost_first().collect::<Vec<_>>(), vec![2, 1, 0]);

        let mut cleanup = CleanupEscalations::new();
        let gone = active.disregard_from(1, &mut cleanup);
        assert_eq!(gone.iter().map(|n| &**n).collect::<Vec<_>>(), vec!["inner", "middle"]);
        assert_eq!(active.innermost_first().collect::<Vec<_>>(), vec![0]);
        assert!(cleanup.is_empty());
        assert_eq!(
            *journal.0.lock().unwrap(),
            vec!["inner disregard", "middle disregard"]
        );
        assert!(active.attach(2, payload(1)).is_err());
    }

    struct Stubborn;

    impl Governance for Stubborn {
        fn govern(&mut self, _ext: Payload) -> Result<(), Escalation> {
            Ok(())
        }
        fn enforce(&mut self) -> Result<(), Escalation> {
            Ok(())
        }
        fn disregard(&mut self) {
            panic!("rollback failed");
        }
    }

    #[test]
    fn panicking_disregard_is_collected_and_the_rest_still_run() {
        let journal = Journal::default();
        let mut active = ActiveGovernances::new();
        active.activate(0, "outer".into(), factory("outer", &journal).as_ref());
        active.activate(1, "stubborn".into(), GovernanceFn::arc(|| Stubborn).as_ref());

        let mut cleanup = CleanupEscalations::new();
        let gone = active.disregard_from(0, &mut cleanup);

        assert_eq!(gone.iter().map(|n| &**n).collect::<Vec<_>>(), vec!["stubborn", "outer"]);
        assert_eq!(*journal.0.lock().unwrap(), vec!["outer disregard"]);
        assert_eq!(cleanup.len(), 1);
        assert_eq!(cleanup.iter().next().unwrap().message(), "rollback failed");
        assert!(active.complete().is_ok());
    }
}
