//! Single mutation entry point for the entity store.
//!
//! Both update channels hand their completed results here. Application is
//! idempotent and commutative over ideas: the store is treated as a
//! monotone set keyed by id, so duplicate or reordered deliveries converge
//! to the same content. Any number of mutations between two frames raise a
//! single coalesced change notification.

use std::collections::HashSet;

use crate::constants::DEFAULT_HEADER;
use crate::idea::{Idea, IdeaId};
use crate::store::{EntityStore, UpsertOutcome};

/// A completed unit of work from one of the channels.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// Full collection from a poll. `authoritative` is false when some
    /// entries had to be discarded, in which case no removals happen.
    Snapshot {
        ideas: Vec<Idea>,
        header: Option<String>,
        authoritative: bool,
    },
    /// Full state sent by the push collaborator on subscribe. Never used
    /// for removals.
    Hello {
        ideas: Vec<Idea>,
        header: Option<String>,
    },
    IdeaAdded(Idea),
    HeaderChanged(String),
}

/// What one [`Update`] did to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: Vec<IdeaId>,
    pub confirmed: usize,
    pub removed: Vec<IdeaId>,
    /// Ids re-delivered with conflicting content; first version kept.
    pub conflicts: Vec<IdeaId>,
    pub header_changed: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || !self.removed.is_empty() || self.header_changed
    }
}

#[derive(Debug)]
pub struct Reconciler {
    store: EntityStore,
    header: String,
    changed: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            store: EntityStore::new(),
            header: DEFAULT_HEADER.to_string(),
            changed: false,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn upsert(&mut self, idea: Idea) -> UpsertOutcome {
        let outcome = self.store.upsert(idea);
        if outcome.is_new() {
            self.changed = true;
        }
        outcome
    }

    /// Replace the header. Blank text is ignored. Returns whether it changed.
    pub fn set_header(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || text == self.header {
            return false;
        }
        self.header = text.to_string();
        self.changed = true;
        true
    }

    pub fn apply(&mut self, update: Update) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        match update {
            Update::Snapshot {
                ideas,
                header,
                authoritative,
            } => {
                let present: HashSet<IdeaId> = ideas.iter().map(|i| i.id).collect();
                self.upsert_all(ideas, &mut report);
                if authoritative {
                    report.removed = self.store.remove_missing(&present);
                    if !report.removed.is_empty() {
                        self.changed = true;
                    }
                }
                if let Some(header) = header {
                    report.header_changed = self.set_header(&header);
                }
            }
            Update::Hello { ideas, header } => {
                self.upsert_all(ideas, &mut report);
                if let Some(header) = header {
                    report.header_changed = self.set_header(&header);
                }
            }
            Update::IdeaAdded(idea) => self.upsert_all(std::iter::once(idea), &mut report),
            Update::HeaderChanged(text) => {
                report.header_changed = self.set_header(&text);
            }
        }
        report
    }

    fn upsert_all(&mut self, ideas: impl IntoIterator<Item = Idea>, report: &mut ReconcileReport) {
        for idea in ideas {
            let id = idea.id;
            match self.upsert(idea) {
                UpsertOutcome::Inserted => report.inserted.push(id),
                UpsertOutcome::Unchanged => report.confirmed += 1,
                UpsertOutcome::Conflict => report.conflicts.push(id),
            }
        }
    }

    /// Consume the coalesced "store changed" notification.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn idea(id: u64, text: &str) -> Idea {
        Idea::new(IdeaId(id), "tester", text, Timestamp::from_unix_secs(id as i64)).unwrap()
    }

    fn snapshot(ideas: Vec<Idea>) -> Update {
        Update::Snapshot {
            ideas,
            header: None,
            authoritative: true,
        }
    }

    #[test]
    fn test_default_header() {
        let rec = Reconciler::new();
        assert_eq!(rec.header(), DEFAULT_HEADER);
    }

    #[test]
    fn test_poll_then_push_dedups() {
        let mut rec = Reconciler::new();
        let report = rec.apply(snapshot(vec![idea(1, "Reduce meetings")]));
        assert_eq!(report.inserted, vec![IdeaId(1)]);

        let report = rec.apply(Update::IdeaAdded(idea(1, "Reduce meetings")));
        assert!(report.inserted.is_empty());
        assert_eq!(report.confirmed, 1);
        assert!(!report.changed());
        assert_eq!(rec.store().len(), 1);
    }

    #[test]
    fn test_burst_coalesces_into_one_notification() {
        let mut rec = Reconciler::new();
        for i in 1..=20 {
            rec.apply(Update::IdeaAdded(idea(i, "burst")));
        }
        assert!(rec.take_changed());
        assert!(!rec.take_changed());
    }

    #[test]
    fn test_duplicate_does_not_notify() {
        let mut rec = Reconciler::new();
        rec.apply(Update::IdeaAdded(idea(1, "a")));
        rec.take_changed();
        rec.apply(Update::IdeaAdded(idea(1, "a")));
        assert!(!rec.take_changed());
    }

    #[test]
    fn test_conflict_reported_and_first_kept() {
        let mut rec = Reconciler::new();
        rec.apply(Update::IdeaAdded(idea(1, "original")));
        let report = rec.apply(Update::IdeaAdded(idea(1, "tampered")));
        assert_eq!(report.conflicts, vec![IdeaId(1)]);
        assert_eq!(rec.store().get(IdeaId(1)).unwrap().text, "original");
    }

    #[test]
    fn test_non_authoritative_snapshot_never_removes() {
        let mut rec = Reconciler::new();
        rec.apply(Update::IdeaAdded(idea(1, "a")));
        for _ in 0..3 {
            let report = rec.apply(Update::Snapshot {
                ideas: vec![],
                header: None,
                authoritative: false,
            });
            assert!(report.removed.is_empty());
        }
        assert!(rec.store().contains(IdeaId(1)));
    }

    #[test]
    fn test_hello_never_removes() {
        let mut rec = Reconciler::new();
        rec.apply(Update::IdeaAdded(idea(1, "a")));
        rec.apply(Update::Hello {
            ideas: vec![],
            header: None,
        });
        rec.apply(Update::Hello {
            ideas: vec![idea(2, "b")],
            header: Some("New question?".into()),
        });
        assert!(rec.store().contains(IdeaId(1)));
        assert!(rec.store().contains(IdeaId(2)));
        assert_eq!(rec.header(), "New question?");
    }

    #[test]
    fn test_two_consecutive_misses_remove() {
        let mut rec = Reconciler::new();
        rec.apply(snapshot(vec![idea(1, "a"), idea(5, "e")]));
        rec.take_changed();

        let first = rec.apply(snapshot(vec![idea(1, "a")]));
        assert!(first.removed.is_empty());
        assert!(!rec.take_changed());

        let second = rec.apply(snapshot(vec![idea(1, "a")]));
        assert_eq!(second.removed, vec![IdeaId(5)]);
        assert!(rec.take_changed());
    }

    #[test]
    fn test_header_updates() {
        let mut rec = Reconciler::new();
        let report = rec.apply(Update::HeaderChanged("  How should we use AI?  ".into()));
        assert!(report.header_changed);
        assert_eq!(rec.header(), "How should we use AI?");

        let report = rec.apply(Update::HeaderChanged("How should we use AI?".into()));
        assert!(!report.header_changed);

        let report = rec.apply(Update::HeaderChanged("   ".into()));
        assert!(!report.header_changed);
        assert_eq!(rec.header(), "How should we use AI?");
    }
}
