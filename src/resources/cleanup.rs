use crate::escalation::Escalation;

/// Failures collected while recycling resources.
///
/// Recycling never stops at the first failure: every slot is recycled and
/// each failure lands here, reported alongside the process result.
#[derive(Debug, Default, Clone)]
pub struct CleanupEscalations {
    items: Vec<Escalation>,
}

impl CleanupEscalations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, escalation: Escalation) {
        self.items.push(escalation);
    }

    pub fn extend(&mut self, other: CleanupEscalations) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Escalation> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Escalation> {
        self.items
    }
}
