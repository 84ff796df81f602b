//! Record diffing
//!
//! [`build_diff`] compares the existing and desired records of one zone and
//! returns one [`RecordGroupDiff`] per grouping key that needs a change.
//!
//! ## Algorithm
//!
//! 1. Bucket existing and desired records by grouping key.
//! 2. Existing-only buckets become a `deletion` of every existing record.
//! 3. Desired-only buckets become a `creation` of every desired record.
//! 4. Buckets present on both sides are compared by their sets of
//!    comparison keys. Equal sets produce nothing; otherwise an `update`
//!    deletes the existing records whose key is not desired and creates the
//!    desired records whose key does not exist yet.
//!
//! Repeated records with the same comparison key count once, so a duplicate
//! left in the zone by someone else is never deleted on its own.
//!
//! Updates never patch in place: `to_update` is always empty.
//!
//! Groups are returned sorted by grouping key. Within a group, records keep
//! their input order.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::record::{DiffKind, ProviderRecord, RecordGroupDiff, ZoneState};
use crate::traits::RecordKeys;

struct Group<T> {
    existing: Vec<T>,
    desired: Vec<T>,
}

impl<T> Default for Group<T> {
    fn default() -> Self {
        Self {
            existing: Vec::new(),
            desired: Vec::new(),
        }
    }
}

/// Compute the changes needed to turn `state.existing` into `state.desired`
///
/// # Errors
///
/// Returns [`Error::Invariant`] if `state.desired` has not been populated.
pub fn build_diff<T, K>(state: &ZoneState<T>, keys: &K) -> Result<Vec<RecordGroupDiff<T>>>
where
    T: Clone,
    K: RecordKeys<T> + ?Sized,
{
    let desired = state.desired.as_ref().ok_or_else(|| {
        Error::invariant(format!(
            "desired records not populated for zone {}",
            state.zone.fqdn
        ))
    })?;

    let mut groups: BTreeMap<String, Group<T>> = BTreeMap::new();
    for record in &state.existing {
        groups
            .entry(keys.grouping_key(record))
            .or_default()
            .existing
            .push(record.clone());
    }
    for record in desired {
        groups
            .entry(keys.grouping_key(record))
            .or_default()
            .desired
            .push(record.clone());
    }

    let mut diffs = Vec::new();
    for (_, group) in groups {
        match (group.existing.is_empty(), group.desired.is_empty()) {
            (false, true) => diffs.push(RecordGroupDiff {
                kind: DiffKind::Deletion,
                to_delete: group.existing.clone(),
                existing: group.existing,
                desired: Vec::new(),
                to_create: Vec::new(),
                to_update: Vec::new(),
            }),
            (true, false) => diffs.push(RecordGroupDiff {
                kind: DiffKind::Creation,
                to_create: group.desired.clone(),
                existing: Vec::new(),
                desired: group.desired,
                to_delete: Vec::new(),
                to_update: Vec::new(),
            }),
            (false, false) => {
                let existing_keys = key_set(&group.existing, keys);
                let desired_keys = key_set(&group.desired, keys);
                if existing_keys == desired_keys {
                    continue;
                }
                let to_delete = missing_from(&group.existing, &desired_keys, keys);
                let to_create = missing_from(&group.desired, &existing_keys, keys);
                diffs.push(RecordGroupDiff {
                    kind: DiffKind::Update,
                    existing: group.existing,
                    desired: group.desired,
                    to_delete,
                    to_create,
                    to_update: Vec::new(),
                });
            }
            (true, true) => {}
        }
    }

    Ok(diffs)
}

fn key_set<T, K>(records: &[T], keys: &K) -> HashSet<String>
where
    K: RecordKeys<T> + ?Sized,
{
    records.iter().map(|r| keys.comparison_key(r)).collect()
}

/// Records whose comparison key is not in `other`
fn missing_from<T, K>(records: &[T], other: &HashSet<String>, keys: &K) -> Vec<T>
where
    T: Clone,
    K: RecordKeys<T> + ?Sized,
{
    records
        .iter()
        .filter(|record| !other.contains(&keys.comparison_key(record)))
        .cloned()
        .collect()
}

/// Number of records a change set creates and deletes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub creates: usize,
    pub deletes: usize,
}

impl ChangeCounts {
    /// Count the records touched by `diffs`
    pub fn of<T>(diffs: &[RecordGroupDiff<T>]) -> Self {
        diffs.iter().fold(Self::default(), |acc, diff| Self {
            creates: acc.creates + diff.to_create.len(),
            deletes: acc.deletes + diff.to_delete.len(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.creates == 0 && self.deletes == 0
    }
}

impl std::ops::AddAssign for ChangeCounts {
    fn add_assign(&mut self, other: Self) {
        self.creates += other.creates;
        self.deletes += other.deletes;
    }
}

/// Human-readable listing of a change set, one line per record
///
/// Deletions are listed before creations within each group.
pub fn render_diff<T: ProviderRecord>(diffs: &[RecordGroupDiff<T>]) -> String {
    let mut lines = Vec::new();
    for diff in diffs {
        for record in &diff.to_delete {
            lines.push(format!("  - {}", record.dns()));
        }
        for record in &diff.to_create {
            lines.push(format!("  + {}", record.dns()));
        }
    }
    lines.join("\n")
}
