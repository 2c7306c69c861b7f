//! Shared worker-thread machinery for the threaded teams.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use tracing::{debug, error};

use super::Work;
use crate::error::TeamError;
use crate::sync::{lock, panic_message};

/// N named threads draining one MPMC queue.
pub(crate) struct Crew {
    name: String,
    sender: Mutex<Option<Sender<Work>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Crew {
    /// Spawns `size` (at least 1) worker threads named `{name}-{i}`.
    pub(crate) fn spawn(name: impl Into<String>, size: usize) -> std::io::Result<Self> {
        let name = name.into();
        let (tx, rx) = unbounded::<Work>();
        let mut workers = Vec::with_capacity(size.max(1));

        for i in 0..size.max(1) {
            let rx = rx.clone();
            let team = name.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    while let Ok(work) = rx.recv() {
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(work)) {
                            error!(team = %team, panic = %panic_message(&*panic), "work panicked");
                        }
                    }
                    debug!(team = %team, worker = i, "worker released");
                })?;
            workers.push(handle);
        }

        Ok(Self {
            name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn assign(&self, work: Work) -> Result<(), TeamError> {
        let guard = lock(&self.sender);
        let stopped = || TeamError::Stopped {
            team: self.name.clone(),
        };
        match guard.as_ref() {
            Some(tx) => tx.send(work).map_err(|_| stopped()),
            None => Err(stopped()),
        }
    }

    /// Closes the queue, lets workers drain it, then joins them.
    pub(crate) fn shutdown(&self) {
        drop(lock(&self.sender).take());
        let workers = std::mem::take(&mut *lock(&self.workers));
        for handle in workers {
            let _ = handle.join();
        }
    }

    pub(crate) fn size(&self) -> usize {
        lock(&self.workers).len()
    }
}

impl Drop for Crew {
    fn drop(&mut self) {
        drop(lock(&self.sender).take());
    }
}
