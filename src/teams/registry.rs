//! # Team registry.
//!
//! Maps team names to stable indices. Function, administration and
//! governance descriptors store the index; the floor resolves it per dispatch.
//!
//! ## Rules
//! - Indices are assigned in registration order and never reused.
//! - Registering an existing name replaces the team but keeps its index.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::Team;

/// Name → team lookup built before binding.
#[derive(Default, Clone)]
pub struct TeamRegistry {
    index: HashMap<String, usize>,
    teams: Vec<(String, Arc<dyn Team>)>,
}

impl TeamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `team` under `name` and returns its index.
    pub fn register(&mut self, name: impl Into<String>, team: Arc<dyn Team>) -> usize {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            self.teams[idx].1 = team;
            return idx;
        }
        let idx = self.teams.len();
        self.index.insert(name.clone(), idx);
        self.teams.push((name, team));
        idx
    }

    /// Index of the team registered as `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&Arc<dyn Team>> {
        self.teams.get(idx).map(|(_, t)| t)
    }

    pub fn name_of(&self, idx: usize) -> Option<&str> {
        self.teams.get(idx).map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Shuts every team down in registration order.
    ///
    /// Blocks until threaded teams have drained and joined.
    pub fn shutdown_all(&self) {
        for (name, team) in &self.teams {
            team.shutdown();
            debug!(team = %name, "team released");
        }
    }
}
