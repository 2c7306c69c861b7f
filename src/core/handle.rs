use std::sync::Arc;

use crate::core::process::ProcessState;
use crate::escalation::Escalation;

/// Caller's view of one invoked process.
///
/// Cheap to clone. The process runs whether or not the handle is kept.
#[derive(Clone)]
pub struct ProcessHandle {
    process: Arc<ProcessState>,
}

impl ProcessHandle {
    pub(crate) fn new(process: Arc<ProcessState>) -> Self {
        Self { process }
    }

    pub fn id(&self) -> u64 {
        self.process.id
    }

    /// `true` once every thread of the process has finished and its
    /// resources are recycled.
    pub fn is_complete(&self) -> bool {
        self.process.is_complete()
    }

    /// The unhandled escalation that failed the process, if any.
    pub fn failure(&self) -> Option<Escalation> {
        self.process.failure()
    }

    /// Recycle failures collected so far.
    pub fn cleanup_escalations(&self) -> Vec<Escalation> {
        self.process.cleanup()
    }

    /// Waits for completion; `Err` carries the failing escalation.
    pub async fn wait(&self) -> Result<(), Escalation> {
        let mut done = self.process.done();
        // The sender lives in the process itself, so the channel cannot close here.
        let _ = done.wait_for(|complete| *complete).await;
        match self.process.failure() {
            Some(escalation) => Err(escalation),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.process.id)
            .field("entry", &self.process.entry)
            .field("complete", &self.is_complete())
            .finish()
    }
}
