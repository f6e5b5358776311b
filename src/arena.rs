//! A reference-counted slab with free-list reuse.
//!
//! `RefVec<T>` is the single storage primitive behind every dimension's node
//! array and the summary array: a `Vec<T>` paired with a parallel refcount
//! array and a free list of released slots. Nothing above this layer knows
//! (or needs to know) how `T`'s edges are wired up; `RefVec` only tracks
//! "is this slot alive", leaving cascading cleanup to the caller.

use std::collections::HashMap;

use log::trace;

use crate::handle::Handle;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct RefVec<T> {
    values: Vec<T>,
    ref_counts: Vec<u32>,
    #[serde(skip)]
    free_list: Vec<Handle>,
}

impl<T> RefVec<T> {
    pub(crate) fn new() -> Self {
        RefVec {
            values: Vec::new(),
            ref_counts: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn ref_count(&self, h: Handle) -> u32 {
        self.ref_counts[h.index()]
    }

    pub(crate) fn at(&self, h: Handle) -> &T {
        &self.values[h.index()]
    }

    pub(crate) fn at_mut(&mut self, h: Handle) -> &mut T {
        &mut self.values[h.index()]
    }

    pub(crate) fn set(&mut self, h: Handle, v: T) {
        self.values[h.index()] = v;
    }

    /// Inserts a value with refcount 0. The caller is responsible for
    /// retaining it through whatever edge will keep it alive.
    pub(crate) fn insert(&mut self, v: T) -> Handle {
        if let Some(h) = self.free_list.pop() {
            debug_assert_eq!(self.ref_counts[h.index()], 0);
            trace!("arena: reusing freed slot {h:?}");
            self.values[h.index()] = v;
            h
        } else {
            self.values.push(v);
            self.ref_counts.push(0);
            let h = Handle((self.values.len() - 1) as u32);
            trace!("arena: growing to accommodate {h:?}");
            h
        }
    }

    /// Increments `h`'s refcount and returns the new value.
    pub(crate) fn retain(&mut self, h: Handle) -> u32 {
        self.ref_counts[h.index()] += 1;
        trace!("arena: retain {h:?} -> {}", self.ref_counts[h.index()]);
        self.ref_counts[h.index()]
    }

    /// Decrements `h`'s refcount, recycling the slot onto the free list if
    /// it reaches zero. Returns the new refcount.
    pub(crate) fn release(&mut self, h: Handle) -> u32 {
        debug_assert!(self.ref_counts[h.index()] > 0);
        self.ref_counts[h.index()] -= 1;
        let count = self.ref_counts[h.index()];
        trace!("arena: release {h:?} -> {count}");
        if count == 0 {
            self.free_list.push(h);
        }
        count
    }

    /// Drops all dead slots from the back of the storage forward, swapping
    /// live entries down into the vacated positions. Returns the map from
    /// pre-compaction handle to post-compaction handle for every entry that
    /// moved; entries not present in the map kept their handle.
    pub(crate) fn compact(&mut self) -> HashMap<Handle, Handle> {
        let mut result = HashMap::new();
        if self.free_list.is_empty() {
            return result;
        }
        self.free_list.sort_unstable();

        let mut values_i = self.values.len() - 1;
        let mut holes_b = 0usize;
        let mut holes_e = self.free_list.len();

        while holes_b != holes_e {
            if self.ref_counts[values_i] == 0 {
                holes_e -= 1;
                self.values.pop();
                self.ref_counts.pop();
                if values_i == 0 {
                    break;
                }
                values_i -= 1;
                continue;
            }
            let hole = self.free_list[holes_b];
            debug_assert_eq!(self.ref_counts[hole.index()], 0);
            debug_assert!(hole.index() < values_i);

            self.values.swap(hole.index(), values_i);
            self.ref_counts.swap(hole.index(), values_i);
            result.insert(Handle(values_i as u32), hole);
            self.values.pop();
            self.ref_counts.pop();

            holes_b += 1;
            if values_i == 0 {
                break;
            }
            values_i -= 1;
        }

        self.free_list.clear();
        result
    }

    /// Recomputes the free list from `ref_counts`, discarding whatever was
    /// there before. Used after deserialization, where the free list is
    /// deliberately not part of the wire format (it's fully determined by
    /// which slots have a zero refcount).
    pub(crate) fn rebuild_free_list(&mut self) {
        self.free_list.clear();
        self.free_list.extend(
            self.ref_counts
                .iter()
                .enumerate()
                .filter(|(_, &rc)| rc == 0)
                .map(|(i, _)| Handle(i as u32)),
        );
    }

    pub(crate) fn iter_live(&self) -> impl Iterator<Item = Handle> + '_ {
        self.ref_counts
            .iter()
            .enumerate()
            .filter(|(_, &rc)| rc > 0)
            .map(|(i, _)| Handle(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_reuses_freed_slots() {
        let mut v: RefVec<i32> = RefVec::new();
        let a = v.insert(1);
        let b = v.insert(2);
        v.retain(a);
        v.retain(b);
        assert_eq!(v.release(a), 0);
        let c = v.insert(3);
        assert_eq!(c, a, "freed slot should be reused before growing");
        assert_eq!(*v.at(c), 3);
        assert_eq!(*v.at(b), 2);
    }

    #[test]
    fn compact_remaps_only_moved_handles() {
        let mut v: RefVec<i32> = RefVec::new();
        let a = v.insert(10);
        let b = v.insert(20);
        let c = v.insert(30);
        v.retain(a);
        v.retain(c);
        v.release(b);

        let remap = v.compact();
        assert_eq!(v.len(), 2);
        assert_eq!(remap.len(), 1);
        let new_c = remap[&c];
        assert_eq!(*v.at(new_c), 30);
        assert_eq!(*v.at(a), 10);
    }

    #[test]
    fn rebuild_free_list_recovers_zero_refcount_slots() {
        let mut v: RefVec<i32> = RefVec::new();
        let a = v.insert(1);
        let b = v.insert(2);
        let c = v.insert(3);
        v.retain(a);
        v.retain(c);
        // Simulate a slab that arrived via deserialization: values and
        // ref_counts are populated but the (skipped) free list is empty,
        // even though `b`'s refcount is zero.
        v.free_list.clear();
        v.rebuild_free_list();

        let d = v.insert(4);
        assert_eq!(d, b, "rebuilt free list should offer up the zero-refcount slot");
    }
}
