// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Id sets
//!
//! An [`IdSet`] stores a set of item [`Id`]s as compacted clock ranges per client. Its main use is
//! as a *delete set*: the ids of all items a transaction (or a whole document) has deleted.
//!
//! Ranges of a client are kept sorted, non-overlapping and non-adjacent at all times, so two sets
//! holding the same ids are always structurally equal. That property is what makes encoded
//! updates deterministic.
use crate::id::{ClientId, Id};
use smallvec::SmallVec;
use std::{
    collections::{BTreeMap, btree_map},
    fmt,
    ops::Range,
};

/// Sorted, compacted clock ranges of a single client.
pub type ClockRanges = SmallVec<[Range<u64>; 4]>;

/// A set of item ids, stored as compacted clock ranges per client.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IdSet(BTreeMap<ClientId, ClockRanges>);

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct ids in the set.
    pub fn len(&self) -> u64 {
        self.0
            .values()
            .flat_map(|ranges| ranges.iter())
            .map(|r| r.end - r.start)
            .sum()
    }

    /// Adds `len` consecutive ids starting at `id`.
    pub fn insert(&mut self, id: Id, len: u64) {
        if len == 0 {
            return;
        }
        self.insert_range(id.client, id.clock..id.clock.saturating_add(len));
    }

    /// Adds a clock range of a client.
    pub fn insert_range(&mut self, client: ClientId, range: Range<u64>) {
        if range.is_empty() {
            return;
        }
        let ranges = self.0.entry(client).or_default();

        // find the first range that does not strictly precede `range`. it may be adjacent to,
        // overlap with, or come strictly after `range`.
        let i = ranges.partition_point(|r| r.end < range.start);
        if i == ranges.len() {
            ranges.push(range);
        } else if ranges[i].start <= range.end {
            // overlapping or adjacent
            let merged = ranges[i].start.min(range.start)..ranges[i].end.max(range.end);
            ranges[i] = merged;
            normalize_starting_at(ranges, i);
        } else {
            ranges.insert(i, range);
        }
    }

    pub fn contains(&self, id: &Id) -> bool {
        let Some(ranges) = self.0.get(&id.client) else {
            return false;
        };
        let p = ranges.partition_point(|r| r.end <= id.clock);
        ranges.get(p).is_some_and(|r| r.contains(&id.clock))
    }

    /// Adds every id of `other` to `self`.
    pub fn merge(&mut self, other: IdSet) {
        for (client, ranges) in other.0 {
            for range in ranges {
                self.insert_range(client, range);
            }
        }
    }

    /// Ranges of a single client, if any.
    pub fn ranges(&self, client: ClientId) -> Option<&[Range<u64>]> {
        self.0.get(&client).map(|r| r.as_slice())
    }

    /// Iterates over clients in ascending order together with their ranges.
    pub fn iter(&self) -> btree_map::Iter<'_, ClientId, ClockRanges> {
        self.0.iter()
    }

    /// Iterates over every single id in the set.
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.0.iter().flat_map(|(&client, ranges)| {
            ranges
                .iter()
                .flat_map(move |r| r.clone().map(move |clock| Id::new(client, clock)))
        })
    }
}

/// Merges ranges following `ranges[i]` into it for as long as they overlap or touch.
///
/// Assumes only `ranges[i]` was modified since the last time the list was normalized.
fn normalize_starting_at(ranges: &mut ClockRanges, i: usize) {
    let right_start = i + 1;
    let mut j = right_start;
    while j < ranges.len() && ranges[j].start <= ranges[i].end {
        ranges[i].end = ranges[i].end.max(ranges[j].end);
        j += 1;
    }
    if j != right_start {
        ranges.drain(right_start..j);
    }
}

impl FromIterator<Id> for IdSet {
    fn from_iter<T: IntoIterator<Item = Id>>(iter: T) -> Self {
        let mut set = IdSet::new();
        for id in iter {
            set.insert(id, 1);
        }
        set
    }
}

impl Extend<Id> for IdSet {
    fn extend<T: IntoIterator<Item = Id>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use std::collections::BTreeSet;

    #[test]
    fn adjacent_inserts_compact() {
        let mut set = IdSet::new();
        set.insert(Id::new(1, 0), 2);
        set.insert(Id::new(1, 4), 1);
        set.insert(Id::new(1, 2), 2);
        assert_eq!(set.ranges(1), Some(&[0..5][..]));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn bridging_insert_swallows_following_ranges() {
        let mut set = IdSet::new();
        set.insert_range(1, 0..1);
        set.insert_range(1, 3..4);
        set.insert_range(1, 6..7);
        set.insert_range(1, 10..12);
        set.insert_range(1, 1..8);
        assert_eq!(set.ranges(1), Some(&[0..8, 10..12][..]));
    }

    #[test]
    fn contains_respects_gaps() {
        let set: IdSet = [Id::new(2, 1), Id::new(2, 3)].into_iter().collect();
        assert!(set.contains(&Id::new(2, 1)));
        assert!(!set.contains(&Id::new(2, 2)));
        assert!(set.contains(&Id::new(2, 3)));
        assert!(!set.contains(&Id::new(3, 1)));
    }

    #[test]
    fn merge_is_union() {
        let mut a: IdSet = [Id::new(1, 0), Id::new(2, 5)].into_iter().collect();
        let b: IdSet = [Id::new(1, 1), Id::new(3, 0)].into_iter().collect();
        a.merge(b);
        let ids: Vec<_> = a.ids().collect();
        assert_eq!(
            ids,
            vec![Id::new(1, 0), Id::new(1, 1), Id::new(2, 5), Id::new(3, 0)]
        );
    }

    #[quickcheck]
    fn insertion_order_does_not_matter(clocks: Vec<u8>) -> TestResult {
        let forward: IdSet = clocks.iter().map(|&c| Id::new(1, c.into())).collect();
        let backward: IdSet = clocks.iter().rev().map(|&c| Id::new(1, c.into())).collect();
        let expected: BTreeSet<u64> = clocks.iter().map(|&c| c.into()).collect();
        let actual: BTreeSet<u64> = forward.ids().map(|id| id.clock).collect();
        TestResult::from_bool(forward == backward && expected == actual)
    }
}
