use super::crew::Crew;
use super::{Team, Work};
use crate::error::TeamError;

/// Fixed-size pool of dedicated threads sharing one queue.
///
/// Work is executed in submission order per worker, but with more than one
/// worker no global order is guaranteed.
pub struct ThreadPoolTeam {
    crew: Crew,
}

impl ThreadPoolTeam {
    /// Spawns a pool of `size` threads (at least one).
    pub fn new(name: impl Into<String>, size: usize) -> std::io::Result<Self> {
        Ok(Self {
            crew: Crew::spawn(name, size)?,
        })
    }

    /// Number of live worker threads (0 after shutdown).
    pub fn size(&self) -> usize {
        self.crew.size()
    }
}

impl Team for ThreadPoolTeam {
    fn name(&self) -> &str {
        self.crew.name()
    }

    fn assign(&self, work: Work) -> Result<(), TeamError> {
        self.crew.assign(work)
    }

    fn shutdown(&self) {
        self.crew.shutdown();
    }
}
