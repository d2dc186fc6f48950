//! Index/barcode consistency checking for libraries headed to the same
//! flow cell. The check is read-only and advisory-blocking: warnings
//! inform, hard errors stop lane loading and sequencing submission.

use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;
use uuid::Uuid;

use crate::db::model::library::INDEX_POSITIONS;

/// One library's barcode situation on one lane, lifted out of the entity
/// graph so the check stays pure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub library_id: Uuid,
    pub library_name: String,
    pub lane: i32,
    pub indices: [Option<String>; INDEX_POSITIONS],
}

/// Two of a library's own index positions carry the same sequence.
/// Suspicious, but demultiplexable, so submission is not blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum IndexWarning {
    SamePair { first: usize, second: usize },
}

impl std::fmt::Display for IndexWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SamePair { first, second } => {
                write!(f, "Index {first} and {second} are the same for the library.")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum IndexError {
    #[error("No indices are present for the library.")]
    NoIndices,
    #[error("Duplicate barcode combination for two or more libraries in the lane.")]
    DuplicateCombination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub warnings: Vec<IndexWarning>,
    pub errors: Vec<IndexError>,
}

#[derive(Debug, Clone)]
pub struct IndexCheckReport {
    rows: Vec<(IndexRow, Annotations)>,
}

impl IndexCheckReport {
    /// No hard error anywhere; warnings do not count.
    #[must_use]
    pub fn passes(&self) -> bool {
        self.rows.iter().all(|(_, a)| a.errors.is_empty())
    }

    #[must_use]
    pub fn annotations(&self, library_id: Uuid) -> Option<&Annotations> {
        self.rows
            .iter()
            .find(|(row, _)| row.library_id == library_id)
            .map(|(_, annotations)| annotations)
    }

    pub fn rows(&self) -> impl Iterator<Item = &(IndexRow, Annotations)> {
        self.rows.iter()
    }
}

/// Validates the index assignments of a set of libraries grouped by lane.
///
/// Positions nobody uses are excluded from comparison, so an unused field
/// can never manufacture a collision. A library with nothing in any used
/// position is a hard error and sits out the duplicate scan; libraries in
/// the same lane whose used positions spell the same tuple are all flagged
/// as duplicates, not just the later occurrences.
#[must_use]
pub fn check_indices(rows: &[IndexRow]) -> IndexCheckReport {
    let present: Vec<usize> = (0..INDEX_POSITIONS)
        .filter(|&position| rows.iter().any(|row| row.indices[position].is_some()))
        .collect();

    let mut annotations = vec![Annotations::default(); rows.len()];

    for (row, annotation) in rows.iter().zip(&mut annotations) {
        for (first, second) in (0..INDEX_POSITIONS).tuple_combinations() {
            if let (Some(a), Some(b)) = (&row.indices[first], &row.indices[second]) {
                if a == b {
                    annotation.warnings.push(IndexWarning::SamePair {
                        first: first + 1,
                        second: second + 1,
                    });
                }
            }
        }

        if present.iter().all(|&position| row.indices[position].is_none()) {
            annotation.errors.push(IndexError::NoIndices);
        }
    }

    let mut combinations: HashMap<(i32, Vec<&str>), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        if annotations[i].errors.contains(&IndexError::NoIndices) {
            continue;
        }

        let combination = present
            .iter()
            .map(|&position| row.indices[position].as_deref().unwrap_or(""))
            .collect();
        combinations
            .entry((row.lane, combination))
            .or_default()
            .push(i);
    }

    for group in combinations.values() {
        if group.len() > 1 {
            for &i in group {
                annotations[i].errors.push(IndexError::DuplicateCombination);
            }
        }
    }

    IndexCheckReport {
        rows: rows.iter().cloned().zip(annotations).collect(),
    }
}
