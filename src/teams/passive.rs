use std::sync::atomic::{AtomicBool, Ordering};

use super::{Team, Work};
use crate::error::TeamError;

/// Team that runs work synchronously on the assigning thread.
///
/// No threads are owned; `assign` returns after the work has run. Useful for
/// deterministic tests and for cheap functions that need no hop.
pub struct PassiveTeam {
    name: String,
    stopped: AtomicBool,
}

impl PassiveTeam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stopped: AtomicBool::new(false),
        }
    }
}

impl Team for PassiveTeam {
    fn name(&self) -> &str {
        &self.name
    }

    fn assign(&self, work: Work) -> Result<(), TeamError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(TeamError::Stopped {
                team: self.name.clone(),
            });
        }
        work();
        Ok(())
    }

    fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}
