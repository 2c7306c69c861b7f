//! # Escalation tables: cause type → handler function.
//!
//! One table per scope (function, governance, process). Resolution picks the
//! **most specific** declared cause, i.e. the smallest inheritance distance
//! from the raised cause. Two distinct declared causes at the same distance
//! are reported as [`EscalationMatch::Ambiguous`] rather than guessed.

use super::cause::CauseType;

/// One `(cause → handler)` pair; `handler` is a function descriptor index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationEntry {
    /// Declared cause.
    pub cause: CauseType,
    /// Index of the handling function.
    pub handler: usize,
}

/// Result of resolving a cause against a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationMatch {
    /// A single most-specific handler.
    Handler(usize),
    /// Nothing in this table matches.
    Unmatched,
    /// Several declared causes match at the same specificity.
    Ambiguous(Vec<String>),
}

/// Ordered list of escalation entries for one scope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EscalationTable {
    entries: Vec<EscalationEntry>,
}

impl EscalationTable {
    /// Creates a table from entries (declaration order is kept).
    pub fn new(entries: Vec<EscalationEntry>) -> Self {
        Self { entries }
    }

    /// Returns the entries.
    pub fn entries(&self) -> &[EscalationEntry] {
        &self.entries
    }

    /// Returns `true` if no handler is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves `cause` to the most specific handler.
    pub fn resolve(&self, cause: &CauseType) -> EscalationMatch {
        let mut best: Option<usize> = None;
        let mut candidates: Vec<&EscalationEntry> = Vec::new();

        for entry in &self.entries {
            let Some(distance) = cause.distance_to(&entry.cause) else {
                continue;
            };
            match best {
                Some(b) if distance > b => {}
                Some(b) if distance == b => candidates.push(entry),
                _ => {
                    best = Some(distance);
                    candidates.clear();
                    candidates.push(entry);
                }
            }
        }

        match candidates.as_slice() {
            [] => EscalationMatch::Unmatched,
            [only] => EscalationMatch::Handler(only.handler),
            many => {
                let mut names: Vec<String> =
                    many.iter().map(|e| e.cause.name().to_string()).collect();
                names.sort_unstable();
                names.dedup();
                EscalationMatch::Ambiguous(names)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cause: &CauseType, handler: usize) -> EscalationEntry {
        EscalationEntry {
            cause: cause.clone(),
            handler,
        }
    }

    #[test]
    fn most_specific_handler_wins() {
        let io = CauseType::new("IOFailure");
        let not_found = CauseType::extending("FileNotFound", [io.clone()]);
        let table = EscalationTable::new(vec![
            entry(&CauseType::failure(), 0),
            entry(&io, 1),
            entry(&not_found, 2),
        ]);

        assert_eq!(table.resolve(&not_found), EscalationMatch::Handler(2));
        assert_eq!(table.resolve(&io), EscalationMatch::Handler(1));
        assert_eq!(
            table.resolve(&CauseType::timeout()),
            EscalationMatch::Handler(0)
        );
    }

    #[test]
    fn equal_specificity_is_ambiguous() {
        let a = CauseType::new("A");
        let b = CauseType::new("B");
        let both = CauseType::extending("AB", [a.clone(), b.clone()]);
        let table = EscalationTable::new(vec![entry(&a, 0), entry(&b, 1)]);

        assert_eq!(
            table.resolve(&both),
            EscalationMatch::Ambiguous(vec!["A".into(), "B".into()])
        );
    }

    #[test]
    fn unrelated_cause_is_unmatched() {
        let table = EscalationTable::new(vec![entry(&CauseType::new("IOFailure"), 0)]);
        assert_eq!(
            table.resolve(&CauseType::timeout()),
            EscalationMatch::Unmatched
        );
        assert!(EscalationTable::default().is_empty());
    }
}
