use std::collections::{BTreeSet, HashMap, HashSet, btree_set};

use crate::constants::REMOVAL_STRIKES;
use crate::idea::{Idea, IdeaId};
use crate::time::Timestamp;

/// Result of offering an idea to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Unknown id, now stored.
    Inserted,
    /// Known id with matching content. No-op confirmation.
    Unchanged,
    /// Known id whose re-delivery disagrees with the stored idea.
    /// The stored (first-seen) idea is kept.
    Conflict,
}

impl UpsertOutcome {
    pub fn is_new(self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

/// Canonical in-memory mirror of the remote collection.
///
/// Exactly one idea per id. Ideas are never updated in place; an id only
/// leaves the store after it is missing from [`REMOVAL_STRIKES`]
/// consecutive authoritative snapshots.
#[derive(Debug, Default)]
pub struct EntityStore {
    ideas: HashMap<IdeaId, Idea>,
    order: BTreeSet<(Timestamp, IdeaId)>,
    /// Consecutive authoritative snapshots each stored id has been absent from.
    misses: HashMap<IdeaId, u32>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    pub fn contains(&self, id: IdeaId) -> bool {
        self.ideas.contains_key(&id)
    }

    pub fn get(&self, id: IdeaId) -> Option<&Idea> {
        self.ideas.get(&id)
    }

    /// Insert if unknown; first writer wins otherwise.
    pub fn upsert(&mut self, idea: Idea) -> UpsertOutcome {
        match self.ideas.get(&idea.id) {
            Some(existing) if existing.same_content(&idea) => UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Conflict,
            None => {
                self.order.insert(idea.display_key());
                self.ideas.insert(idea.id, idea);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Apply one full authoritative snapshot. Ids present reset their miss
    /// count; ids absent accumulate a strike and are removed on reaching
    /// [`REMOVAL_STRIKES`]. Returns the removed ids in ascending order.
    pub fn remove_missing(&mut self, authoritative: &HashSet<IdeaId>) -> Vec<IdeaId> {
        let mut removed = Vec::new();
        for id in self.ideas.keys() {
            if authoritative.contains(id) {
                self.misses.remove(id);
                continue;
            }
            let strikes = self.misses.entry(*id).or_insert(0);
            *strikes += 1;
            if *strikes >= REMOVAL_STRIKES {
                removed.push(*id);
            }
        }

        for id in &removed {
            self.misses.remove(id);
            if let Some(idea) = self.ideas.remove(id) {
                self.order.remove(&idea.display_key());
            }
        }
        removed.sort();
        removed
    }

    /// Ideas in display order. The iterator is lazy and finite; clone it
    /// (or call again) to restart.
    pub fn snapshot_ordered(&self) -> Ordered<'_> {
        Ordered {
            keys: self.order.iter(),
            ideas: &self.ideas,
        }
    }

    /// Current miss count for an id (0 when present or unknown).
    pub fn strikes(&self, id: IdeaId) -> u32 {
        self.misses.get(&id).copied().unwrap_or(0)
    }
}

/// Display-ordered view over an [`EntityStore`].
#[derive(Clone)]
pub struct Ordered<'a> {
    keys: btree_set::Iter<'a, (Timestamp, IdeaId)>,
    ideas: &'a HashMap<IdeaId, Idea>,
}

impl<'a> Iterator for Ordered<'a> {
    type Item = &'a Idea;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, id) = self.keys.next()?;
        self.ideas.get(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl ExactSizeIterator for Ordered<'_> {}
