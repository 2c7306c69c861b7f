//! # Administration: cross-cutting duties around functions.
//!
//! An administration binding groups named duties under one provider. A
//! function lists the duties it wants as *pre* or *post* duties; the kernel
//! runs them in declaration order on the administration's team, handing
//! each one a [`DutyContext`] that exposes the extensions of the
//! administered resources the function uses.
//!
//! A duty may instigate the flows it declares. Sequential duty flows run to
//! completion before the administered function continues.

use std::sync::Arc;

use crate::core::DutyContext;
use crate::escalation::Escalation;

/// Duty provider.
pub trait Administration: Send + Sync + 'static {
    /// Runs the duty named `duty`.
    fn administer(&self, duty: &str, ctx: &mut DutyContext<'_>) -> Result<(), Escalation>;
}

/// Administration backed by a closure receiving the duty name.
pub struct AdministrationFn<F> {
    f: F,
}

impl<F> AdministrationFn<F>
where
    F: Fn(&str, &mut DutyContext<'_>) -> Result<(), Escalation> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }

    pub fn arc(f: F) -> Arc<dyn Administration> {
        Arc::new(Self::new(f))
    }
}

impl<F> Administration for AdministrationFn<F>
where
    F: Fn(&str, &mut DutyContext<'_>) -> Result<(), Escalation> + Send + Sync + 'static,
{
    fn administer(&self, duty: &str, ctx: &mut DutyContext<'_>) -> Result<(), Escalation> {
        (self.f)(duty, ctx)
    }
}
