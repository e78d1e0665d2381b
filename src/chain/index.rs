use std::collections::{HashMap, HashSet, VecDeque};

use crate::chain::StructuralFault;
use crate::models::{EntryId, Medium, ReadingEntry, ReadingStatus};

/// Ordered view of one medium's readings, tail (oldest) first.
#[derive(Debug, Clone)]
pub struct Chain {
    medium: Medium,
    entries: Vec<ReadingEntry>,
    positions: HashMap<EntryId, usize>,
    faults: Vec<StructuralFault>,
}

impl Chain {
    /// Order a medium's entries by following `previous_id` links.
    ///
    /// Entries of other mediums are dropped and reported; callers are
    /// expected to filter beforehand. A pointer to an id outside the set is
    /// reported as dangling. Use `build_from_all` to tell cross-medium
    /// pointers apart.
    pub fn build<I>(medium: Medium, entries: I) -> Self
    where
        I: IntoIterator<Item = ReadingEntry>,
    {
        Self::assemble(medium, entries, &HashMap::new())
    }

    /// Build the chain for `medium` out of every known entry
    pub fn build_from_all(medium: Medium, all: &[ReadingEntry]) -> Self {
        let foreign: HashMap<EntryId, Medium> = all
            .iter()
            .filter(|e| e.medium != medium)
            .map(|e| (e.id, e.medium))
            .collect();
        let own = all.iter().filter(|e| e.medium == medium).cloned();
        Self::assemble(medium, own, &foreign)
    }

    fn assemble<I>(medium: Medium, entries: I, foreign: &HashMap<EntryId, Medium>) -> Self
    where
        I: IntoIterator<Item = ReadingEntry>,
    {
        let mut faults = Vec::new();
        let mut arena: HashMap<EntryId, ReadingEntry> = HashMap::new();

        for entry in entries {
            if entry.medium != medium {
                faults.push(StructuralFault::WrongMedium {
                    entry: entry.id,
                    medium: entry.medium,
                });
                continue;
            }
            if arena.contains_key(&entry.id) {
                faults.push(StructuralFault::DuplicateId { entry: entry.id });
                continue;
            }
            arena.insert(entry.id, entry);
        }

        let mut ids: Vec<EntryId> = arena.keys().copied().collect();
        ids.sort_unstable();

        // Successor lists are filled in ascending id order, so every list is sorted
        let mut successors: HashMap<EntryId, Vec<EntryId>> = HashMap::new();
        let mut tails = Vec::new();
        for &id in &ids {
            match arena[&id].previous_id {
                None => tails.push(id),
                Some(previous) if arena.contains_key(&previous) => {
                    successors.entry(previous).or_default().push(id);
                }
                Some(previous) => {
                    match foreign.get(&previous) {
                        Some(&other) => faults.push(StructuralFault::CrossMedium {
                            entry: id,
                            previous,
                            medium: other,
                        }),
                        None => faults.push(StructuralFault::DanglingPrevious { entry: id, previous }),
                    }
                    // Best effort: an unresolvable pointer starts its own path
                    tails.push(id);
                }
            }
        }

        for &id in &ids {
            if let Some(next) = successors.get(&id) {
                if next.len() > 1 {
                    faults.push(StructuralFault::Divergent {
                        previous: id,
                        successors: next.clone(),
                    });
                }
            }
        }

        let heads: Vec<EntryId> = ids
            .iter()
            .copied()
            .filter(|id| successors.get(id).is_none_or(|next| next.is_empty()))
            .collect();
        if tails.len() > 1 {
            faults.push(StructuralFault::MultipleTails { tails: tails.clone() });
        }
        if heads.len() > 1 {
            faults.push(StructuralFault::MultipleHeads { heads });
        }

        let mut visited: HashSet<EntryId> = HashSet::with_capacity(ids.len());
        let mut order: Vec<EntryId> = Vec::with_capacity(ids.len());
        // Side branches met along the way, walked once their fork is ordered
        let mut branches: VecDeque<EntryId> = VecDeque::new();

        for &tail in &tails {
            walk(tail, &successors, &mut visited, &mut order, &mut branches);
        }

        let mut scan = 0;
        loop {
            while let Some(id) = branches.pop_front() {
                walk(id, &successors, &mut visited, &mut order, &mut branches);
            }

            // Whatever is left cannot reach a tail, so it sits on or behind a cycle
            while scan < ids.len() && visited.contains(&ids[scan]) {
                scan += 1;
            }
            let Some(&start) = ids.get(scan) else {
                break;
            };
            let members = cycle_through(start, &arena, ids.len());
            let mut sorted = members.clone();
            sorted.sort_unstable();
            faults.push(StructuralFault::Cycle { entries: sorted });
            for id in members {
                if visited.insert(id) {
                    order.push(id);
                    branches.extend(successors.get(&id).into_iter().flatten().copied());
                }
            }
        }

        let entries: Vec<ReadingEntry> = order
            .into_iter()
            .filter_map(|id| arena.remove(&id))
            .collect();
        let positions = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.id, pos))
            .collect();

        Self {
            medium,
            entries,
            positions,
            faults,
        }
    }

    pub fn medium(&self) -> Medium {
        self.medium
    }

    /// Entries in chain order, tail first
    pub fn entries(&self) -> &[ReadingEntry] {
        &self.entries
    }

    pub fn faults(&self) -> &[StructuralFault] {
        &self.faults
    }

    pub fn is_faulted(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ReadingEntry>, Vec<StructuralFault>) {
        (self.entries, self.faults)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReadingEntry> {
        self.entries.iter()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: EntryId) -> Option<&ReadingEntry> {
        self.position(id).map(|pos| &self.entries[pos])
    }

    /// Oldest end of the chain
    pub fn tail(&self) -> Option<&ReadingEntry> {
        self.entries.first()
    }

    /// Most-future end of the chain
    pub fn head(&self) -> Option<&ReadingEntry> {
        self.entries.last()
    }

    pub fn predecessor(&self, id: EntryId) -> Option<&ReadingEntry> {
        self.get(id)?.previous_id.and_then(|previous| self.get(previous))
    }

    pub fn successor(&self, id: EntryId) -> Option<&ReadingEntry> {
        let pos = self.position(id)?;
        self.entries
            .get(pos + 1)
            .filter(|next| next.previous_id == Some(id))
    }

    /// The entry being read. If several are open, the one nearest the head wins.
    pub fn current(&self) -> Option<&ReadingEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.status() == ReadingStatus::Current)
    }

    /// Up to `window` entries on each side of `id`
    pub fn window(
        &self,
        id: EntryId,
        window: usize,
    ) -> Option<(&[ReadingEntry], &ReadingEntry, &[ReadingEntry])> {
        let pos = self.position(id)?;
        let start = pos.saturating_sub(window);
        let end = (pos + 1 + window).min(self.entries.len());
        Some((
            &self.entries[start..pos],
            &self.entries[pos],
            &self.entries[pos + 1..end],
        ))
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a ReadingEntry;
    type IntoIter = std::slice::Iter<'a, ReadingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Follow successors from `start`, taking the lowest unvisited id at each
/// branch and queueing the others
fn walk(
    start: EntryId,
    successors: &HashMap<EntryId, Vec<EntryId>>,
    visited: &mut HashSet<EntryId>,
    order: &mut Vec<EntryId>,
    branches: &mut VecDeque<EntryId>,
) {
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        if !visited.insert(id) {
            break;
        }
        order.push(id);
        cursor = None;
        for &next in successors.get(&id).into_iter().flatten() {
            if visited.contains(&next) {
                continue;
            }
            match cursor {
                None => cursor = Some(next),
                Some(_) => branches.push_back(next),
            }
        }
    }
}

/// Members of the cycle reached by walking predecessors from `start`, in
/// successor order. Every entry on the walk must resolve inside `arena`.
fn cycle_through(
    start: EntryId,
    arena: &HashMap<EntryId, ReadingEntry>,
    bound: usize,
) -> Vec<EntryId> {
    let mut seen = HashSet::new();
    let mut cursor = start;
    for _ in 0..=bound {
        if !seen.insert(cursor) {
            break;
        }
        match arena.get(&cursor).and_then(|e| e.previous_id) {
            Some(previous) if arena.contains_key(&previous) => cursor = previous,
            _ => return vec![start],
        }
    }

    // `cursor` repeats, so it lies on the cycle; trace it once
    let anchor = cursor;
    let mut members = vec![anchor];
    let mut at = anchor;
    for _ in 0..bound {
        match arena.get(&at).and_then(|e| e.previous_id) {
            Some(previous) if previous != anchor => {
                members.push(previous);
                at = previous;
            }
            _ => break,
        }
    }
    members.reverse();
    members
}
