//! Old id / new id compaction with merging and elimination
//!
//! A [`Remapper`] starts as the identity over `0..size`. Ids are then
//! scheduled for dropping, either as the secondary of a merge (its contents
//! move onto a surviving primary) or by outright elimination. Reordering
//! swaps every dropped id past a shrinking `new_end`, so that afterwards
//! `old_from_new[..new_size]` lists the surviving old ids. Merge and
//! eliminate lists are kept in new-id space and follow every swap.

use crate::mesh::types::EntityId;
use std::fmt::Write;

/// A merge of `secondary` onto `primary`, both as new ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairEntry<T> {
    pub primary: T,
    pub secondary: T,
}

impl<T: EntityId> PairEntry<T> {
    /// Exchange `lhs` and `rhs` wherever they appear
    fn swap(&mut self, lhs: T, rhs: T) {
        if self.primary == lhs {
            self.primary = rhs;
        } else if self.primary == rhs {
            self.primary = lhs;
        }
        if self.secondary == lhs {
            self.secondary = rhs;
        } else if self.secondary == rhs {
            self.secondary = lhs;
        }
    }
}

/// List of merge pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairEntries<T> {
    pub entries: Vec<PairEntry<T>>,
}

impl<T: EntityId> PairEntries<T> {
    pub fn insert(&mut self, primary: T, secondary: T) {
        self.entries.push(PairEntry { primary, secondary });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_primary(&self, primary: T) -> Option<&PairEntry<T>> {
        self.entries.iter().find(|e| e.primary == primary)
    }

    pub fn find_secondary(&self, secondary: T) -> Option<&PairEntry<T>> {
        self.entries.iter().find(|e| e.secondary == secondary)
    }

    fn swap(&mut self, lhs: T, rhs: T) {
        for entry in &mut self.entries {
            entry.swap(lhs, rhs);
        }
    }
}

/// Index compaction table for one entity kind
#[derive(Debug, Clone)]
pub struct Remapper<T> {
    pub old_size: usize,
    pub new_size: usize,
    /// Boundary between kept (`< new_end`) and dropped new ids
    pub new_end: usize,
    /// False once merges or trimming made the mapping many-to-one
    pub is_bijection: bool,
    pub old_used: Vec<bool>,
    pub old_from_new: Vec<T>,
    pub new_from_old: Vec<T>,
    pub merge: PairEntries<T>,
    pub eliminate: Vec<T>,
}

impl<T: EntityId> Remapper<T> {
    /// Identity mapping over `size` ids
    pub fn new(size: usize) -> Self {
        let identity: Vec<T> = (0..size).map(T::from_index).collect();
        Self {
            old_size: size,
            new_size: size,
            new_end: size,
            is_bijection: true,
            old_used: vec![false; size],
            old_from_new: identity.clone(),
            new_from_old: identity,
            merge: PairEntries {
                entries: Vec::new(),
            },
            eliminate: Vec::new(),
        }
    }

    pub fn old_id(&self, new_id: T) -> T {
        self.old_from_new[new_id.slot()]
    }

    pub fn new_id(&self, old_id: T) -> T {
        self.new_from_old[old_id.slot()]
    }

    /// Rebuild `new_from_old` from `old_from_new[..new_size]`
    pub fn create_new_from_old_mapping(&mut self) {
        for new_index in 0..self.new_size {
            let old_id = self.old_from_new[new_index];
            self.new_from_old[old_id.slot()] = T::from_index(new_index);
        }
    }

    /// Exchange two new ids, keeping merge and eliminate lists in step
    ///
    /// # Panics
    ///
    /// Panics when both ids are equal.
    pub fn swap(&mut self, secondary_new_id: T, keep_new_id: T) {
        assert!(
            secondary_new_id != keep_new_id,
            "Remapper::swap: cannot swap {} with itself",
            keep_new_id
        );
        let secondary_old_id = self.old_from_new[secondary_new_id.slot()];
        let keep_old_id = self.old_from_new[keep_new_id.slot()];
        self.old_from_new
            .swap(secondary_new_id.slot(), keep_new_id.slot());
        self.new_from_old
            .swap(secondary_old_id.slot(), keep_old_id.slot());

        self.merge.swap(keep_new_id, secondary_new_id);
        for id in &mut self.eliminate {
            if *id == keep_new_id {
                *id = secondary_new_id;
            } else if *id == secondary_new_id {
                *id = keep_new_id;
            }
        }
    }

    /// Move `new_end` one step down, optionally past unused slots
    ///
    /// # Panics
    ///
    /// Panics when no slot is left.
    pub fn get_next_end(&mut self, check_used: bool) -> T {
        loop {
            assert!(self.new_end > 0, "Remapper::get_next_end: no slots left");
            self.new_end -= 1;
            if check_used && !self.old_used[self.old_from_new[self.new_end].slot()] {
                continue;
            }
            return T::from_index(self.new_end);
        }
    }

    /// Swap every merge secondary, then every eliminated id, past `new_end`
    pub fn reorder_to_drop_merge_duplicates_and_eliminated(&mut self) {
        for i in 0..self.merge.len() {
            let secondary_new_id = self.merge.entries[i].secondary;
            self.drop_id(secondary_new_id);
        }
        for i in 0..self.eliminate.len() {
            let eliminated_new_id = self.eliminate[i];
            self.drop_id(eliminated_new_id);
        }
        log::trace!(
            "Dropped {} merged and {} eliminated ids, {} of {} kept",
            self.merge.len(),
            self.eliminate.len(),
            self.new_end,
            self.old_size
        );
    }

    fn drop_id(&mut self, new_id: T) {
        if new_id.slot() >= self.new_end {
            return;
        }
        let keep_new_id = self.get_next_end(false);
        if keep_new_id != new_id {
            self.swap(new_id, keep_new_id);
        }
    }

    /// Partition new ids so that every id whose old id is marked with
    /// [`use_old`](Self::use_old) comes before `new_end`
    pub fn reorder_to_drop_unused(&mut self) {
        let mut lo = 0usize;
        let mut hi = self.new_size;
        loop {
            while lo < hi && self.old_used[self.old_from_new[lo].slot()] {
                lo += 1;
            }
            while hi > lo && !self.old_used[self.old_from_new[hi - 1].slot()] {
                hi -= 1;
            }
            if lo + 1 >= hi {
                break;
            }
            self.swap(T::from_index(lo), T::from_index(hi - 1));
            lo += 1;
            hi -= 1;
        }
        self.new_end = lo;
        log::trace!("{} of {} ids used", self.new_end, self.new_size);
    }

    /// Point every merged-away old id at its primary's new id
    pub fn update_secondary_new_from_old(&mut self) {
        for entry in &self.merge.entries {
            let secondary_old_id = self.old_from_new[entry.secondary.slot()];
            self.new_from_old[secondary_old_id.slot()] = entry.primary;
        }
        self.is_bijection = false;
    }

    /// Visit every merge whose primary is `primary_new_id`
    ///
    /// The callback receives `(primary_new, primary_old, secondary_new,
    /// secondary_old)`.
    pub fn for_each_primary_new(&self, primary_new_id: T, mut callback: impl FnMut(T, T, T, T)) {
        for entry in self.merge.entries.iter().filter(|e| e.primary == primary_new_id) {
            callback(
                primary_new_id,
                self.old_from_new[primary_new_id.slot()],
                entry.secondary,
                self.old_from_new[entry.secondary.slot()],
            );
        }
    }

    /// Finalize: `new_size` becomes `new_end`
    pub fn trim(&mut self) {
        self.is_bijection = false;
        self.new_size = self.new_end;
    }

    /// Like [`trim`](Self::trim), reporting every dropped `(new, old)` pair
    pub fn trim_with(&mut self, mut remove_callback: impl FnMut(T, T)) {
        for new_index in self.new_end..self.old_size {
            let new_id = T::from_index(new_index);
            remove_callback(new_id, self.old_id(new_id));
        }
        self.trim();
    }

    pub fn use_old(&mut self, old_id: T) {
        self.old_used[old_id.slot()] = true;
    }

    /// Surviving old ids in new id order
    pub fn kept_old_ids(&self) -> &[T] {
        &self.old_from_new[..self.new_size]
    }

    /// Dump both directions at trace level
    ///
    /// While the mapping is a bijection, entries that do not map back are
    /// marked with `!` and reported as an error. Returns false when any
    /// such mismatch was found.
    pub fn dump(&self) -> bool {
        let mut error = false;
        let mut out = String::new();
        for old_index in 0..self.old_size {
            let new_id = self.new_from_old[old_index];
            let mismatch = self.is_bijection
                && self
                    .old_from_new
                    .get(new_id.slot())
                    .map_or(true, |old| old.slot() != old_index);
            error |= mismatch;
            let _ = write!(out, "{:>3}{}", new_id.slot(), if mismatch { "!" } else { " " });
        }
        out.push_str("  < new from old\n");
        for new_index in 0..self.new_size {
            let old_id = self.old_from_new[new_index];
            let mismatch = self.is_bijection
                && self
                    .new_from_old
                    .get(old_id.slot())
                    .map_or(true, |new| new.slot() != new_index);
            error |= mismatch;
            let _ = write!(out, "{:>3}{}", old_id.slot(), if mismatch { "!" } else { " " });
        }
        out.push_str("  < old from new");
        log::trace!("\n{}", out);
        if error {
            log::error!("Remapper mapping is inconsistent");
        }
        !error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::PolygonId;

    fn ids(values: &[u32]) -> Vec<PolygonId> {
        values.iter().map(|&v| PolygonId(v)).collect()
    }

    #[test]
    fn test_identity() {
        let remapper: Remapper<PolygonId> = Remapper::new(4);
        assert_eq!(remapper.kept_old_ids(), ids(&[0, 1, 2, 3]).as_slice());
        assert_eq!(remapper.new_id(PolygonId(2)), PolygonId(2));
        assert!(remapper.dump());
    }

    #[test]
    fn test_merge_and_eliminate() {
        let mut remapper: Remapper<PolygonId> = Remapper::new(6);
        remapper.merge.insert(PolygonId(0), PolygonId(1));
        remapper.eliminate.push(PolygonId(3));
        remapper.eliminate.push(PolygonId(5));

        remapper.reorder_to_drop_merge_duplicates_and_eliminated();
        assert!(remapper.dump());
        remapper.update_secondary_new_from_old();
        remapper.trim();

        assert_eq!(remapper.new_size, 3);
        let mut kept = remapper.kept_old_ids().to_vec();
        kept.sort();
        assert_eq!(kept, ids(&[0, 2, 4]));

        // The merged-away id maps onto its primary
        let primary_new = remapper.new_id(PolygonId(0));
        assert_eq!(remapper.new_id(PolygonId(1)), primary_new);
        assert_eq!(remapper.old_id(primary_new), PolygonId(0));

        // Surviving ids map back onto themselves
        for new_index in 0..remapper.new_size {
            let old = remapper.old_from_new[new_index];
            assert_eq!(remapper.new_id(old).slot(), new_index);
        }
    }

    #[test]
    fn test_merge_secondary_at_end() {
        let mut remapper: Remapper<PolygonId> = Remapper::new(3);
        remapper.merge.insert(PolygonId(0), PolygonId(2));
        remapper.merge.insert(PolygonId(0), PolygonId(1));
        remapper.reorder_to_drop_merge_duplicates_and_eliminated();
        remapper.trim();
        assert_eq!(remapper.kept_old_ids(), ids(&[0]).as_slice());
    }

    #[test]
    fn test_for_each_primary_new() {
        let mut remapper: Remapper<PolygonId> = Remapper::new(5);
        remapper.merge.insert(PolygonId(1), PolygonId(3));
        remapper.merge.insert(PolygonId(1), PolygonId(4));
        remapper.merge.insert(PolygonId(0), PolygonId(2));
        remapper.reorder_to_drop_merge_duplicates_and_eliminated();

        let primary_new = remapper.new_id(PolygonId(1));
        let mut secondaries_old = Vec::new();
        remapper.for_each_primary_new(primary_new, |p_new, p_old, _s_new, s_old| {
            assert_eq!(p_new, primary_new);
            assert_eq!(p_old, PolygonId(1));
            secondaries_old.push(s_old);
        });
        secondaries_old.sort();
        assert_eq!(secondaries_old, ids(&[3, 4]));
    }

    #[test]
    fn test_drop_unused_clustered() {
        let mut remapper: Remapper<PolygonId> = Remapper::new(5);
        remapper.use_old(PolygonId(2));
        remapper.use_old(PolygonId(4));
        remapper.reorder_to_drop_unused();
        remapper.trim();

        assert_eq!(remapper.new_size, 2);
        let mut kept = remapper.kept_old_ids().to_vec();
        kept.sort();
        assert_eq!(kept, ids(&[2, 4]));
    }

    #[test]
    fn test_trim_with_reports_dropped() {
        let mut remapper: Remapper<PolygonId> = Remapper::new(4);
        remapper.eliminate.push(PolygonId(1));
        remapper.reorder_to_drop_merge_duplicates_and_eliminated();
        let mut dropped = Vec::new();
        remapper.trim_with(|_new, old| dropped.push(old));
        assert_eq!(dropped, ids(&[1]));
        assert_eq!(remapper.new_size, 3);
    }
}
