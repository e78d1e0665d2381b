//! Reading chain engine.
//!
//! A chain is the ordered list of one medium's readings, stored as a
//! backward-linked list: every entry names its predecessor through
//! `previous_id`, and the entry with no predecessor is the tail (oldest end).
//! Everything in here is pure: the index builds an ordered view, the mutator
//! computes pointer update sets, and the projection turns word counts into
//! dates. Persisting results is the store's job.

pub mod index;
pub mod mutator;
pub mod projection;

use std::fmt;
use thiserror::Error;

use crate::models::{EntryId, Medium};

pub use index::Chain;
pub use mutator::{PointerChange, UpdateSet, insert_after, move_after, remove, repair};
pub use projection::{
    ChainProjection, ProjectedDates, Projection, ProjectionInput, ProjectionWarning, Progress,
    duration_days, progress_on, project, project_chain, project_current,
};

/// A requested mutation was rejected; nothing was changed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Reading {id} not found in the {medium} chain")]
    NotFound { id: EntryId, medium: Medium },
    #[error("Moving reading {entry} after {target} would create a cycle")]
    Cycle { entry: EntryId, target: EntryId },
    #[error("Reading {0} is already part of the chain")]
    AlreadyInChain(EntryId),
    #[error("Reading {entry} belongs to the {found} chain, not {expected}")]
    MediumMismatch {
        entry: EntryId,
        expected: Medium,
        found: Medium,
    },
    #[error("The {medium} chain has {faults} structural fault(s); repair it first")]
    Faulted { medium: Medium, faults: usize },
}

/// Pre-existing corruption found while building a chain.
///
/// Faults never stop `Chain::build`; the chain is still returned in a
/// best-effort order so it can be shown and repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralFault {
    Cycle { entries: Vec<EntryId> },
    MultipleTails { tails: Vec<EntryId> },
    MultipleHeads { heads: Vec<EntryId> },
    Divergent { previous: EntryId, successors: Vec<EntryId> },
    DanglingPrevious { entry: EntryId, previous: EntryId },
    CrossMedium { entry: EntryId, previous: EntryId, medium: Medium },
    DuplicateId { entry: EntryId },
    WrongMedium { entry: EntryId, medium: Medium },
}

fn join_ids(ids: &[EntryId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for StructuralFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralFault::Cycle { entries } => {
                write!(f, "cycle through readings {}", join_ids(entries))
            }
            StructuralFault::MultipleTails { tails } => {
                write!(f, "{} chain starts (readings {})", tails.len(), join_ids(tails))
            }
            StructuralFault::MultipleHeads { heads } => {
                write!(f, "{} chain ends (readings {})", heads.len(), join_ids(heads))
            }
            StructuralFault::Divergent { previous, successors } => write!(
                f,
                "readings {} all follow reading {}",
                join_ids(successors),
                previous
            ),
            StructuralFault::DanglingPrevious { entry, previous } => write!(
                f,
                "reading {} points at missing reading {}",
                entry, previous
            ),
            StructuralFault::CrossMedium { entry, previous, medium } => write!(
                f,
                "reading {} points at reading {} from the {} chain",
                entry, previous, medium
            ),
            StructuralFault::DuplicateId { entry } => {
                write!(f, "reading {} appears more than once", entry)
            }
            StructuralFault::WrongMedium { entry, medium } => {
                write!(f, "reading {} belongs to the {} chain", entry, medium)
            }
        }
    }
}
