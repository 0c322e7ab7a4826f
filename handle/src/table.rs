//! The slot table: free-list, growth, allocation/assignment/removal,
//! validation, the destroyed-flag protocol, and iteration — wrapped in the
//! reader/writer concurrency contract of spec §5.
//!
//! The mutating/lookup logic lives on [`TableInner`], reachable only through
//! a [`TableReadGuard`]/[`TableWriteGuard`] obtained from [`Table::read`]/
//! [`Table::write`] (the shared/exclusive lock acquisitions spec §6 calls
//! `lock(mode)`). Guards release the lock (and deregister from the
//! lock-order registry) on `Drop`, which is this crate's RAII stand-in for
//! spec §6's explicit `unlock(mode)` — idiomatic Rust over a manual pair of
//! calls a caller could forget to balance.
//!
//! Free-list/slab control flow grounded on
//! `slopos_drivers::net::socket::SlabSocketTable`; the doubly-linked
//! free-list bookkeeping on `slopos_mm::shared_memory::FreeListEntry`. The
//! lock itself is `slopos_lib::spinlock::IrqRwLock`, used verbatim.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::Any;
use core::ops::{Deref, DerefMut};

use slopos_lib::{IrqRwLock, IrqRwLockReadGuard, IrqRwLockWriteGuard, klog_debug, klog_error};

use crate::codec::{decode, encode, Handle};
use crate::config::{
    ALLOCATOR_TAG, GROWTH_INCREMENT, INVALID_INDEX, LOCK_ORDER_TAG, MAX_SIZE, MIN_FREE_ENTRIES,
};
use crate::error::{HandleError, HandleResult};
use crate::external::{DefaultSlotArena, LockOrderRegistry, NullLockOrder, SlotArena};
use crate::slot::{FREE, ObjectRef, ObjectType, Slot, SlotData};

/// Opaque reference to the process object a table is attached to. Passed
/// through to the [`SlotArena`] on growth; never inspected by this crate.
pub type Owner = Arc<dyn Any + Send + Sync>;

/// The guarded table state. Reachable only through [`TableReadGuard`] /
/// [`TableWriteGuard`]; fields stay private so every mutation goes through
/// the invariant-preserving methods below.
pub struct TableInner {
    slots: Vec<Slot>,
    free_head: u32,
    free_tail: u32,
    free_count: u32,
    arena: Arc<dyn SlotArena>,
    owner: Owner,
}

impl TableInner {
    #[inline]
    fn size(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of occupied slots (spec invariant I1).
    pub fn used_entry_count(&self) -> u32 {
        self.size() - self.free_count
    }

    /// Grow the backing array by at least [`GROWTH_INCREMENT`] slots, or to
    /// `min_size` if that is larger. `min_size = 0` means "just grow by the
    /// increment".
    fn expand_table(&mut self, min_size: u32) -> HandleResult {
        if self.free_head != INVALID_INDEX {
            let tail_terminated = matches!(
                self.slots[self.free_tail as usize].data,
                SlotData::Free {
                    next_free: INVALID_INDEX,
                    ..
                }
            );
            if !tail_terminated {
                klog_error!("handle table corruption: free_tail.next is not terminated");
                return Err(HandleError::Corruption);
            }
        }

        let old_size = self.size();
        let new_size = core::cmp::max(old_size.saturating_add(GROWTH_INCREMENT), min_size);
        if new_size > MAX_SIZE {
            klog_error!(
                "handle table growth to {} slots exceeds max size {}",
                new_size,
                MAX_SIZE
            );
            return Err(HandleError::NoMemory);
        }

        if !self
            .arena
            .reserve(self.owner.as_ref(), ALLOCATOR_TAG, new_size as usize)
        {
            klog_error!("handle table arena refused growth to {} slots", new_size);
            return Err(HandleError::NoMemory);
        }

        let was_empty = self.free_head == INVALID_INDEX;
        let prev_tail = self.free_tail;

        self.slots.reserve((new_size - old_size) as usize);
        for i in old_size..new_size {
            let prev_free = if i == old_size { prev_tail } else { i - 1 };
            let next_free = if i + 1 == new_size { INVALID_INDEX } else { i + 1 };
            self.slots.push(Slot::new_free(1, prev_free, next_free));
        }

        if was_empty {
            self.free_head = old_size;
        } else if let SlotData::Free { next_free, .. } = &mut self.slots[prev_tail as usize].data {
            *next_free = old_size;
        }
        self.free_tail = new_size - 1;
        self.free_count += new_size - old_size;

        Ok(())
    }

    /// Allocate a fresh handle for `object`. Returns [`Handle::NULL`] if
    /// growth fails or the free-list is corrupt; never fails otherwise.
    pub fn alloc_handle(
        &mut self,
        object: ObjectRef,
        object_type: ObjectType,
        make_valid: bool,
    ) -> Handle {
        debug_assert!(object_type != FREE, "object_type must not be FREE");

        if self.free_count <= MIN_FREE_ENTRIES && self.expand_table(0).is_err() {
            return Handle::NULL;
        }

        if self.free_head >= self.size() {
            klog_error!("handle table corruption: free_head out of range");
            return Handle::NULL;
        }

        let index = self.free_head;
        let next = match self.slots[index as usize].data {
            SlotData::Free { next_free, .. } => next_free,
            SlotData::Occupied { .. } => {
                klog_error!("handle table corruption: free_head slot is not FREE");
                return Handle::NULL;
            }
        };

        self.free_head = next;
        if next == INVALID_INDEX {
            self.free_tail = INVALID_INDEX;
        } else if let SlotData::Free { prev_free, .. } = &mut self.slots[next as usize].data {
            *prev_free = INVALID_INDEX;
        }

        let slot = &mut self.slots[index as usize];
        let generation = slot.generation;
        slot.instance = 0;
        slot.data = SlotData::Occupied {
            object,
            object_type,
            destroyed: !make_valid,
        };
        self.free_count -= 1;

        Handle::from_raw(encode(index, generation, 0))
    }

    /// Adopt a caller-chosen handle value, growing the table if its index
    /// lies beyond the current size. The caller bears the collision risk
    /// for the generation encoded in `h` (spec §4.5 rationale).
    pub fn assign_handle(
        &mut self,
        object: ObjectRef,
        object_type: ObjectType,
        h: Handle,
    ) -> HandleResult {
        debug_assert!(object_type != FREE, "object_type must not be FREE");

        let (index, generation, _instance) = decode(h.raw());
        if index >= MAX_SIZE {
            return Err(HandleError::InvalidParameter);
        }

        if index >= self.size() {
            // Capped at MAX_SIZE: `index` alone is already known valid (checked
            // above), but `index + GROWTH_INCREMENT` can overshoot MAX_SIZE for
            // indices near the top of the space even though the table could
            // legally grow to MAX_SIZE and still hold `index`.
            self.expand_table(index.saturating_add(GROWTH_INCREMENT).min(MAX_SIZE))?;
        }

        if !self.slots[index as usize].is_free() {
            return Err(HandleError::InvalidParameter);
        }

        let (prev, next) = match self.slots[index as usize].data {
            SlotData::Free {
                prev_free,
                next_free,
            } => (prev_free, next_free),
            SlotData::Occupied { .. } => unreachable!("checked is_free above"),
        };

        if (prev != INVALID_INDEX && prev >= self.size())
            || (next != INVALID_INDEX && next >= self.size())
        {
            klog_error!("handle table corruption: free-list neighbor out of range");
            return Err(HandleError::InvalidParameter);
        }

        if prev == INVALID_INDEX {
            self.free_head = next;
        } else if let SlotData::Free { next_free, .. } = &mut self.slots[prev as usize].data {
            *next_free = next;
        }
        if next == INVALID_INDEX {
            self.free_tail = prev;
        } else if let SlotData::Free { prev_free, .. } = &mut self.slots[next as usize].data {
            *prev_free = prev;
        }

        let slot = &mut self.slots[index as usize];
        slot.generation = generation;
        slot.instance = 0;
        slot.data = SlotData::Occupied {
            object,
            object_type,
            destroyed: false,
        };
        self.free_count -= 1;

        Ok(())
    }

    /// Release `h` back to the free-list, bumping its generation. A handle
    /// previously marked destroyed is still freeable (`ignore_destroyed =
    /// true`). Invalid handles are logged and ignored without mutation.
    pub fn free_handle(&mut self, expected_type: ObjectType, h: Handle) {
        if !self.is_handle_valid(h, true, expected_type) {
            klog_debug!("free_handle: handle {:#010x} is invalid, ignoring", h.raw());
            return;
        }

        let index = decode(h.raw()).0;
        let was_empty = self.free_head == INVALID_INDEX;
        let old_tail = self.free_tail;

        let old_gen = self.slots[index as usize].generation;
        let new_gen = (old_gen % 3) + 1;

        let slot = &mut self.slots[index as usize];
        slot.generation = new_gen;
        slot.instance = 0;
        slot.data = SlotData::Free {
            prev_free: if was_empty { INVALID_INDEX } else { old_tail },
            next_free: INVALID_INDEX,
        };

        if was_empty {
            self.free_head = index;
        } else if let SlotData::Free { next_free, .. } = &mut self.slots[old_tail as usize].data {
            *next_free = index;
        }
        self.free_tail = index;
        self.free_count += 1;
    }

    /// Mark `h` logically deleted without freeing its slot. Returns `false`
    /// (and logs) if `h` is already invalid or already destroyed.
    pub fn mark_destroyed(&mut self, h: Handle) -> bool {
        if !self.is_handle_valid(h, false, FREE) {
            klog_debug!("mark_destroyed: handle {:#010x} is invalid", h.raw());
            return false;
        }
        let index = decode(h.raw()).0;
        if let SlotData::Occupied { destroyed, .. } = &mut self.slots[index as usize].data {
            *destroyed = true;
        }
        true
    }

    /// Roll back a logical delete. Returns `false` (and logs) if `h` is
    /// invalid, including a non-destroyed handle (no-op, logged).
    pub fn unmark_destroyed(&mut self, h: Handle) -> bool {
        if !self.is_handle_valid(h, true, FREE) {
            klog_debug!("unmark_destroyed: handle {:#010x} is invalid", h.raw());
            return false;
        }
        let index = decode(h.raw()).0;
        if let SlotData::Occupied { destroyed, .. } = &mut self.slots[index as usize].data {
            *destroyed = false;
        }
        true
    }

    /// Central validation helper (spec §4.4). Never mutates; any failure is
    /// logged at debug level (expected traffic, not a warning).
    pub fn is_handle_valid(
        &self,
        h: Handle,
        ignore_destroyed: bool,
        requested_type: ObjectType,
    ) -> bool {
        let (index, generation, _instance) = decode(h.raw());
        if index >= self.size() {
            klog_debug!("handle {:#010x}: index {} out of range", h.raw(), index);
            return false;
        }
        let slot = &self.slots[index as usize];
        if slot.generation != generation {
            klog_debug!(
                "handle {:#010x}: generation mismatch (slot has {}, handle wants {})",
                h.raw(),
                slot.generation,
                generation
            );
            return false;
        }
        match &slot.data {
            SlotData::Free { .. } => {
                klog_debug!("handle {:#010x}: slot is free", h.raw());
                false
            }
            SlotData::Occupied {
                object_type,
                destroyed,
                ..
            } => {
                if *destroyed && !ignore_destroyed {
                    klog_debug!("handle {:#010x}: slot is destroyed", h.raw());
                    return false;
                }
                if requested_type != FREE && requested_type != *object_type {
                    klog_debug!(
                        "handle {:#010x}: type mismatch (slot has {}, wanted {})",
                        h.raw(),
                        object_type,
                        requested_type
                    );
                    return false;
                }
                true
            }
        }
    }

    /// Strict lookup: any non-free type is acceptable, destroyed slots are
    /// refused.
    pub fn get_object(&self, h: Handle) -> Option<ObjectRef> {
        self.get_object_by_type(h, FREE)
    }

    /// As [`Self::get_object`], but the slot's type must match `requested_type`.
    pub fn get_object_by_type(&self, h: Handle, requested_type: ObjectType) -> Option<ObjectRef> {
        if !self.is_handle_valid(h, false, requested_type) {
            return None;
        }
        self.occupied_object(h)
    }

    /// As [`Self::get_object_by_type`], but destroyed slots are accepted.
    pub fn get_object_ignore_destroyed(
        &self,
        h: Handle,
        requested_type: ObjectType,
    ) -> Option<ObjectRef> {
        if !self.is_handle_valid(h, true, requested_type) {
            return None;
        }
        self.occupied_object(h)
    }

    fn occupied_object(&self, h: Handle) -> Option<ObjectRef> {
        let index = decode(h.raw()).0;
        match &self.slots[index as usize].data {
            SlotData::Occupied { object, .. } => Some(object.clone()),
            SlotData::Free { .. } => None,
        }
    }

    /// The slot's object type, or [`FREE`] for any invalid handle.
    pub fn get_object_type(&self, h: Handle) -> ObjectType {
        let (index, generation, _instance) = decode(h.raw());
        if index >= self.size() {
            return FREE;
        }
        let slot = &self.slots[index as usize];
        if slot.generation != generation {
            return FREE;
        }
        slot.object_type()
    }

    /// Unchecked accessor for iteration. `index` must name an occupied slot.
    pub fn get_entry_object(&self, index: u32) -> ObjectRef {
        match &self.slots[index as usize].data {
            SlotData::Occupied { object, .. } => object.clone(),
            SlotData::Free { .. } => panic!("get_entry_object: slot {index} is free"),
        }
    }

    /// Unchecked accessor for iteration.
    pub fn get_entry_type(&self, index: u32) -> ObjectType {
        self.slots[index as usize].object_type()
    }

    /// Reconstruct the canonical handle for an occupied slot.
    pub fn build_entry_handle(&self, index: u32) -> Handle {
        let slot = &self.slots[index as usize];
        debug_assert!(!slot.is_free(), "build_entry_handle: slot {index} is free");
        Handle::from_raw(encode(index, slot.generation, slot.instance))
    }

    /// Advance `cursor` to the next occupied slot at index `>= *cursor`.
    /// Returns `None` once the table is exhausted. Callers hold the shared
    /// lock across the full iteration (spec §4.8).
    pub fn next_entry(&self, cursor: &mut u32) -> Option<(ObjectType, Handle, ObjectRef)> {
        let mut i = *cursor;
        while i < self.size() {
            if let SlotData::Occupied {
                object,
                object_type,
                ..
            } = &self.slots[i as usize].data
            {
                let handle = self.build_entry_handle(i);
                let result = (*object_type, handle, object.clone());
                *cursor = i + 1;
                return Some(result);
            }
            i += 1;
        }
        None
    }
}

/// A generational handle table: issues opaque 32-bit handles for
/// kernel-side objects and resolves them back with use-after-free and
/// type-confusion protection (spec §1).
pub struct Table {
    inner: IrqRwLock<TableInner>,
    lock_order: Arc<dyn LockOrderRegistry>,
}

impl Table {
    /// Create an empty table attached to `owner`, backed by `arena` and
    /// registering its lock under `lock_order`.
    pub fn new(owner: Owner, arena: Arc<dyn SlotArena>, lock_order: Arc<dyn LockOrderRegistry>) -> Self {
        Self {
            inner: IrqRwLock::new(TableInner {
                slots: Vec::new(),
                free_head: INVALID_INDEX,
                free_tail: INVALID_INDEX,
                free_count: 0,
                arena,
                owner,
            }),
            lock_order,
        }
    }

    /// Create an empty table with the global allocator and no lock-order
    /// registration, for standalone use and tests.
    pub fn new_default(owner: Owner) -> Self {
        Self::new(owner, Arc::new(DefaultSlotArena), Arc::new(NullLockOrder))
    }

    /// Acquire the shared lock for lookups/iteration.
    pub fn read(&self) -> TableReadGuard<'_> {
        self.lock_order.acquire(LOCK_ORDER_TAG);
        TableReadGuard {
            guard: self.inner.read(),
            lock_order: self.lock_order.as_ref(),
        }
    }

    /// Acquire the exclusive lock to batch one or more mutations.
    pub fn write(&self) -> TableWriteGuard<'_> {
        self.lock_order.acquire(LOCK_ORDER_TAG);
        TableWriteGuard {
            guard: self.inner.write(),
            lock_order: self.lock_order.as_ref(),
        }
    }

    /// Acquire the exclusive lock, allocate one handle, release.
    pub fn alloc_handle_safe(
        &self,
        object: ObjectRef,
        object_type: ObjectType,
        make_valid: bool,
    ) -> Handle {
        self.write().alloc_handle(object, object_type, make_valid)
    }

    /// Acquire the exclusive lock, assign one handle, release.
    pub fn assign_handle_safe(
        &self,
        object: ObjectRef,
        object_type: ObjectType,
        h: Handle,
    ) -> HandleResult {
        self.write().assign_handle(object, object_type, h)
    }

    /// Acquire the exclusive lock, free one handle, release.
    pub fn free_handle_safe(&self, expected_type: ObjectType, h: Handle) {
        self.write().free_handle(expected_type, h)
    }

    /// Acquire the exclusive lock, mark one handle destroyed, release.
    pub fn mark_destroyed(&self, h: Handle) -> bool {
        self.write().mark_destroyed(h)
    }

    /// Acquire the exclusive lock, clear one handle's destroyed flag, release.
    pub fn unmark_destroyed(&self, h: Handle) -> bool {
        self.write().unmark_destroyed(h)
    }

    /// Acquire the shared lock for a single lookup.
    pub fn get_object(&self, h: Handle) -> Option<ObjectRef> {
        self.read().get_object(h)
    }

    /// Acquire the shared lock for a single type-checked lookup.
    pub fn get_object_by_type(&self, h: Handle, t: ObjectType) -> Option<ObjectRef> {
        self.read().get_object_by_type(h, t)
    }

    /// Acquire the shared lock for a single destroyed-ignoring lookup.
    pub fn get_object_ignore_destroyed(&self, h: Handle, t: ObjectType) -> Option<ObjectRef> {
        self.read().get_object_ignore_destroyed(h, t)
    }

    /// Acquire the shared lock to read a handle's object type.
    pub fn get_object_type(&self, h: Handle) -> ObjectType {
        self.read().get_object_type(h)
    }

    /// Acquire the shared lock to read the occupied slot count.
    pub fn used_entry_count(&self) -> u32 {
        self.read().used_entry_count()
    }
}

/// Shared-lock guard. Derefs to [`TableInner`]'s read-only operations.
/// Releases the lock (and deregisters from the lock-order registry) on drop.
pub struct TableReadGuard<'a> {
    guard: IrqRwLockReadGuard<'a, TableInner>,
    lock_order: &'a dyn LockOrderRegistry,
}

impl<'a> Deref for TableReadGuard<'a> {
    type Target = TableInner;

    fn deref(&self) -> &TableInner {
        &self.guard
    }
}

impl<'a> Drop for TableReadGuard<'a> {
    fn drop(&mut self) {
        self.lock_order.release(LOCK_ORDER_TAG);
    }
}

/// Exclusive-lock guard. Derefs (mutably) to [`TableInner`], so non-"safe"
/// mutators can be batched under a single critical section. Releases the
/// lock on drop.
pub struct TableWriteGuard<'a> {
    guard: IrqRwLockWriteGuard<'a, TableInner>,
    lock_order: &'a dyn LockOrderRegistry,
}

impl<'a> Deref for TableWriteGuard<'a> {
    type Target = TableInner;

    fn deref(&self) -> &TableInner {
        &self.guard
    }
}

impl<'a> DerefMut for TableWriteGuard<'a> {
    fn deref_mut(&mut self) -> &mut TableInner {
        &mut self.guard
    }
}

impl<'a> Drop for TableWriteGuard<'a> {
    fn drop(&mut self) {
        self.lock_order.release(LOCK_ORDER_TAG);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn owner() -> Owner {
        Arc::new(String::from("test-process"))
    }

    fn obj(tag: &'static str) -> ObjectRef {
        Arc::new(tag)
    }

    const T1: ObjectType = 1;
    const T2: ObjectType = 2;

    #[test]
    fn fresh_alloc_scenario() {
        let table = Table::new_default(owner());
        let h1 = table.alloc_handle_safe(obj("A"), T1, true);
        assert!(!h1.is_null());
        assert_eq!(h1.index(), 0);
        assert_eq!(h1.generation(), 1);
        assert_eq!(h1.get_instance(), 0);
        assert!(table.get_object(h1).is_some());
        assert_eq!(table.used_entry_count(), 1);
        {
            let g = table.read();
            assert_eq!(g.slots.len() as u32 - g.free_count, 1);
            assert_eq!(g.free_count, 1023);
        }
    }

    #[test]
    fn stale_handle_detection() {
        let table = Table::new_default(owner());
        let h1 = table.alloc_handle_safe(obj("A"), T1, true);
        table.free_handle_safe(T1, h1);
        assert!(table.get_object(h1).is_none());

        for _ in 0..200 {
            let h = table.alloc_handle_safe(obj("B"), T1, true);
            table.free_handle_safe(T1, h);
        }

        assert!(table.get_object(h1).is_none());
    }

    #[test]
    fn assignment_collision_is_rejected() {
        let table = Table::new_default(owner());
        let mut last = Handle::NULL;
        for _ in 0..=5 {
            last = table.alloc_handle_safe(obj("A"), T1, true);
        }
        let target = Handle::from_raw(encode(last.index(), last.generation(), 0));
        let err = table.assign_handle_safe(obj("B"), T1, target);
        assert_eq!(err, Err(HandleError::InvalidParameter));
    }

    #[test]
    fn assignment_extends_table() {
        let table = Table::new_default(owner());
        let h = Handle::from_raw(encode(2000, 2, 0));
        table
            .assign_handle_safe(obj("A"), T1, h)
            .expect("assign should grow the table");
        assert!(table.get_object(h).is_some());
        {
            let g = table.read();
            assert!(g.slots.len() >= 3024);
            assert_eq!(g.slots[2000].generation, 2);
        }
    }

    #[test]
    fn destroyed_round_trip() {
        let table = Table::new_default(owner());
        let h = table.alloc_handle_safe(obj("A"), T1, true);
        assert!(table.mark_destroyed(h));
        assert!(table.get_object(h).is_none());
        assert!(table.get_object_ignore_destroyed(h, T1).is_some());
        assert!(table.unmark_destroyed(h));
        assert!(table.get_object(h).is_some());
    }

    #[test]
    fn iteration_sees_each_occupied_slot_once() {
        let table = Table::new_default(owner());
        let mut handles = Vec::new();
        for i in 0..5 {
            handles.push(table.alloc_handle_safe(obj("A"), T1, true));
            if i == 2 {
                let doomed = table.alloc_handle_safe(obj("X"), T2, true);
                table.free_handle_safe(T2, doomed);
            }
        }

        let guard = table.read();
        let mut cursor = 0u32;
        let mut seen = Vec::new();
        while let Some((ty, h, _o)) = guard.next_entry(&mut cursor) {
            seen.push((ty, h));
        }
        assert_eq!(seen.len(), 5);
        for w in seen.windows(2) {
            assert!(w[0].1.index() < w[1].1.index());
        }
    }

    #[test]
    fn free_handle_on_invalid_handle_is_a_noop() {
        let table = Table::new_default(owner());
        table.free_handle_safe(T1, Handle::from_raw(0xFFFF_FFFF));
        assert_eq!(table.used_entry_count(), 0);
    }

    #[test]
    fn type_mismatch_rejected() {
        let table = Table::new_default(owner());
        let h = table.alloc_handle_safe(obj("A"), T1, true);
        assert!(table.get_object_by_type(h, T2).is_none());
        assert!(table.get_object_by_type(h, T1).is_some());
        assert_eq!(table.get_object_type(h), T1);
    }

    #[test]
    fn make_valid_false_starts_destroyed() {
        let table = Table::new_default(owner());
        let h = table.alloc_handle_safe(obj("A"), T1, false);
        assert!(table.get_object(h).is_none());
        assert!(table.get_object_ignore_destroyed(h, T1).is_some());
    }

    #[test]
    fn generation_wraps_after_three_frees() {
        // Pin a single slot via `assign_handle` rather than `alloc_handle`,
        // since the free-list is thousands of slots deep after the first
        // growth and `alloc_handle` would hand back a different index on
        // every call long before this one comes back around.
        let table = Table::new_default(owner());
        let index = 5u32;
        let mut generation = 1u8;
        table
            .assign_handle_safe(obj("A"), T1, Handle::from_raw(encode(index, generation, 0)))
            .expect("initial assign");

        for expected in [2u8, 3, 1] {
            table.free_handle_safe(T1, Handle::from_raw(encode(index, generation, 0)));
            generation = table.read().slots[index as usize].generation;
            assert_eq!(generation, expected);
            table
                .assign_handle_safe(obj("A"), T1, Handle::from_raw(encode(index, generation, 0)))
                .expect("reassign after free");
        }
    }

    #[test]
    fn batched_mutations_under_one_write_lock() {
        let table = Table::new_default(owner());
        let (h1, h2) = {
            let mut g = table.write();
            let h1 = g.alloc_handle(obj("A"), T1, true);
            let h2 = g.alloc_handle(obj("B"), T1, true);
            (h1, h2)
        };
        assert_ne!(h1, h2);
        assert_eq!(table.used_entry_count(), 2);
    }
}
