//! Pointer surgery on a chain.
//!
//! Every operation reads a `Chain` and returns the full `UpdateSet` needed to
//! reach the new order, or an error with no updates at all. Links point
//! backward, so only the entries whose `previous_id` actually changes are
//! listed.

use serde::Serialize;

use crate::chain::{Chain, ChainError};
use crate::models::{EntryId, Medium, ReadingEntry};

/// One `previous_id` write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerChange {
    pub entry_id: EntryId,
    pub old_previous: Option<EntryId>,
    pub new_previous: Option<EntryId>,
}

/// Everything one mutation changes, to be applied all together or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateSet {
    pub medium: Medium,
    pub changes: Vec<PointerChange>,
    /// New entry joining the chain, already carrying its final `previous_id`
    pub inserted: Option<ReadingEntry>,
    pub removed: Option<EntryId>,
}

impl UpdateSet {
    fn empty(medium: Medium) -> Self {
        Self {
            medium,
            changes: Vec::new(),
            inserted: None,
            removed: None,
        }
    }

    fn repoint(&mut self, entry: &ReadingEntry, new_previous: Option<EntryId>) {
        self.changes.push(PointerChange {
            entry_id: entry.id,
            old_previous: entry.previous_id,
            new_previous,
        });
    }

    /// True when applying the set would change nothing
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.inserted.is_none() && self.removed.is_none()
    }

    /// Number of entries whose pointer is written
    pub fn touched(&self) -> usize {
        self.changes.len()
    }

    pub fn change_for(&self, id: EntryId) -> Option<&PointerChange> {
        self.changes.iter().find(|change| change.entry_id == id)
    }

    /// Apply the set to an in-memory entry list
    pub fn apply_to(&self, entries: &mut Vec<ReadingEntry>) {
        if let Some(removed) = self.removed {
            entries.retain(|entry| entry.id != removed);
        }
        if let Some(inserted) = &self.inserted {
            entries.push(inserted.clone());
        }
        for change in &self.changes {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == change.entry_id) {
                entry.previous_id = change.new_previous;
            }
        }
    }
}

fn ensure_sound(chain: &Chain) -> Result<(), ChainError> {
    if chain.is_faulted() {
        return Err(ChainError::Faulted {
            medium: chain.medium(),
            faults: chain.faults().len(),
        });
    }
    Ok(())
}

fn lookup(chain: &Chain, id: EntryId) -> Result<&ReadingEntry, ChainError> {
    chain.get(id).ok_or(ChainError::NotFound {
        id,
        medium: chain.medium(),
    })
}

/// Entry that would follow a new member placed after `after` (`None` = tail slot)
fn slot_successor(chain: &Chain, after: Option<EntryId>) -> Option<&ReadingEntry> {
    match after {
        Some(id) => chain.successor(id),
        None => chain.tail(),
    }
}

/// Place `new_entry` right after `after`, or at the tail when `after` is `None`.
pub fn insert_after(
    chain: &Chain,
    new_entry: ReadingEntry,
    after: Option<EntryId>,
) -> Result<UpdateSet, ChainError> {
    ensure_sound(chain)?;
    if new_entry.medium != chain.medium() {
        return Err(ChainError::MediumMismatch {
            entry: new_entry.id,
            expected: chain.medium(),
            found: new_entry.medium,
        });
    }
    if chain.contains(new_entry.id) {
        return Err(ChainError::AlreadyInChain(new_entry.id));
    }
    if let Some(id) = after {
        lookup(chain, id)?;
    }

    let mut updates = UpdateSet::empty(chain.medium());
    updates.repoint(&new_entry, after);
    if let Some(successor) = slot_successor(chain, after) {
        updates.repoint(successor, Some(new_entry.id));
    }

    let mut inserted = new_entry;
    inserted.previous_id = after;
    updates.inserted = Some(inserted);
    Ok(updates)
}

/// Splice `id` out, joining its successor to its predecessor.
pub fn remove(chain: &Chain, id: EntryId) -> Result<UpdateSet, ChainError> {
    ensure_sound(chain)?;
    let entry = lookup(chain, id)?;

    let mut updates = UpdateSet::empty(chain.medium());
    if let Some(successor) = chain.successor(id) {
        updates.repoint(successor, entry.previous_id);
    }
    updates.removed = Some(id);
    Ok(updates)
}

/// Move `id` to sit right after `target`, or at the tail when `target` is `None`.
///
/// Entries only move toward the tail: a target that already lies on the
/// head side of `id` is rejected as a cycle, as is `id` itself.
pub fn move_after(
    chain: &Chain,
    id: EntryId,
    target: Option<EntryId>,
) -> Result<UpdateSet, ChainError> {
    ensure_sound(chain)?;
    let entry = lookup(chain, id)?;
    if let Some(target) = target {
        lookup(chain, target)?;
    }

    let noop = UpdateSet::empty(chain.medium());
    if chain.len() == 1 {
        return Ok(noop);
    }
    if let Some(target) = target {
        if target == id || descends_from(chain, target, id) {
            return Err(ChainError::Cycle { entry: id, target });
        }
    }
    if entry.previous_id == target {
        return Ok(noop);
    }

    let old_successor = chain.successor(id);
    let new_successor = slot_successor(chain, target);

    let mut updates = noop;
    if let Some(successor) = old_successor {
        updates.repoint(successor, entry.previous_id);
    }
    updates.repoint(entry, target);
    if let Some(successor) = new_successor {
        updates.repoint(successor, Some(id));
    }
    Ok(updates)
}

/// True if walking from `node` toward the tail reaches `ancestor`
fn descends_from(chain: &Chain, node: EntryId, ancestor: EntryId) -> bool {
    let mut cursor = chain.get(node).and_then(|e| e.previous_id);
    let mut steps = 0;
    while let Some(id) = cursor {
        if id == ancestor {
            return true;
        }
        steps += 1;
        if steps > chain.len() {
            break;
        }
        cursor = chain.get(id).and_then(|e| e.previous_id);
    }
    false
}

/// Rewrite pointers so the stored links match the chain's current order.
///
/// Works on faulted chains; applying the result leaves a single path.
pub fn repair(chain: &Chain) -> UpdateSet {
    let mut updates = UpdateSet::empty(chain.medium());
    let mut previous = None;
    for entry in chain {
        if entry.previous_id != previous {
            updates.repoint(entry, previous);
        }
        previous = Some(entry.id);
    }
    updates
}
