//! The escalation procedure.
//!
//! An escalation raised by a job is matched against, in order:
//!
//! ```text
//! function table ──► active governances (innermost first) ──► process table ──► default handler
//! ```
//!
//! A matched handler replaces the thread's job stack with one handler job.
//! The handler's own escalations resume the walk past the level that
//! matched, so the chain always moves outward and ends at the default
//! handler.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::core::floor::FloorShared;
use crate::core::job::Job;
use crate::core::thread::ThreadState;
use crate::escalation::{CauseType, Escalation, EscalationMatch};
use crate::events::{Event, EventKind};
use crate::issues::AssetType;
use crate::resources::CleanupEscalations;

/// First level an escalation raised by a job is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Level {
    Function,
    Governances,
    Process,
    Default,
}

impl ThreadState {
    pub(crate) fn escalate(&mut self, floor: &FloorShared, escalation: Escalation) {
        let (from, depth) = self
            .stack
            .last()
            .map_or((Level::Governances, 0), |job| (job.outward, job.depth));
        floor.publish(
            self.job_event(floor, EventKind::EscalationRaised)
                .with_reason(escalation.to_string()),
        );

        if from <= Level::Function {
            if let Some(job) = self.stack.last() {
                let meta = &floor.descriptors.functions[job.function];
                match meta.escalations.resolve(escalation.cause()) {
                    EscalationMatch::Handler(h) => {
                        return self.handle(floor, h, escalation, Level::Governances, depth);
                    }
                    EscalationMatch::Ambiguous(causes) => {
                        return self.ambiguous(floor, AssetType::Function, &meta.qualified, &causes, escalation);
                    }
                    EscalationMatch::Unmatched => {}
                }
            }
        }

        if from <= Level::Governances {
            let active: Vec<usize> = self.governances.innermost_first().collect();
            for g in active {
                let binding = &floor.descriptors.governances[g];
                match binding.escalations.resolve(escalation.cause()) {
                    EscalationMatch::Handler(h) => {
                        if let Some(position) = self.governances.position(g) {
                            self.disregard(floor, position);
                        }
                        return self.handle(floor, h, escalation, Level::Governances, depth);
                    }
                    EscalationMatch::Ambiguous(causes) => {
                        return self.ambiguous(floor, AssetType::Governance, &binding.name, &causes, escalation);
                    }
                    EscalationMatch::Unmatched => {}
                }
            }
        }

        if from <= Level::Process {
            match floor.descriptors.process_escalations.resolve(escalation.cause()) {
                EscalationMatch::Handler(h) => {
                    self.disregard(floor, 0);
                    return self.handle(floor, h, escalation, Level::Default, depth);
                }
                EscalationMatch::Ambiguous(causes) => {
                    let entry = self.process.entry.clone();
                    return self.ambiguous(floor, AssetType::Process, &entry, &causes, escalation);
                }
                EscalationMatch::Unmatched => {}
            }
        }

        self.fail(floor, escalation);
    }

    /// Runs handler `h` in place of the current job stack.
    fn handle(&mut self, floor: &FloorShared, h: usize, escalation: Escalation, outward: Level, depth: usize) {
        let depth = depth + 1;
        if floor.cfg.escalation_depth_limit().is_some_and(|limit| depth > limit) {
            tracing::warn!(
                process = self.process.id,
                depth,
                "escalation handlers nested too deep; failing the process"
            );
            return self.fail(floor, escalation);
        }

        self.discard(floor);
        floor.publish(
            Event::new(EventKind::EscalationHandled)
                .with_process(self.process.id)
                .with_subject(floor.descriptors.functions[h].qualified.as_str())
                .with_reason(escalation.to_string()),
        );
        self.stack.push(Job::handler(h, escalation, outward, depth));
    }

    /// Two causes of one table tie: the process fails with `Ambiguous`.
    fn ambiguous(
        &mut self,
        floor: &FloorShared,
        asset_type: AssetType,
        asset_name: &str,
        causes: &[String],
        escalation: Escalation,
    ) {
        let message = format!(
            "'{}' matches {} equally well",
            escalation.cause().name(),
            causes.join(", ")
        );
        floor
            .issues
            .add_issue(asset_type, asset_name, &message, Some(&escalation));
        let ambiguous = Escalation::new(CauseType::ambiguous(), message).with_source(escalation);
        self.fail(floor, ambiguous);
    }

    /// Hands `escalation` to the default handler and ends the thread's work.
    ///
    /// A panicking handler is recorded as a cleanup escalation; the process
    /// still fails with `escalation`.
    fn fail(&mut self, floor: &FloorShared, escalation: Escalation) {
        self.disregard(floor, 0);
        self.discard(floor);
        let reported = catch_unwind(AssertUnwindSafe(|| floor.handler.unhandled(self.process.id, &escalation)));
        if let Err(panic) = reported {
            let mut cleanup = CleanupEscalations::new();
            cleanup.push(Escalation::from_panic(&*panic));
            self.process.absorb(floor, cleanup);
        }
        self.process.record_failure(escalation.clone());
        self.failure = Some(escalation);
    }

    /// Drops every job, recycling function scopes and forgetting awaited flows.
    fn discard(&mut self, floor: &FloorShared) {
        let mut cleanup = CleanupEscalations::new();
        while let Some(job) = self.stack.pop() {
            job.container.recycle(&mut cleanup);
            for (monitor, key) in job.awaiting {
                floor.monitors[monitor].remove_asset(key);
            }
        }
        self.process.absorb(floor, cleanup);
    }
}
