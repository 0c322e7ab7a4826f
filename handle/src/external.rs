//! Narrow interfaces to the two external collaborators spec §6 names:
//! the typed, process-tagged allocation service backing slot-array growth,
//! and the process-wide lock-order registry. Both are traits so this crate
//! stays leaf-level in the dependency graph — a real SlopOS build wires a
//! production implementation in from `slopos-mm`/`slopos-core` without this
//! crate ever depending on either.
//!
//! Grounded on the narrow surface `slopos_mm::page_alloc` exposes to its
//! callers (`alloc_page_frame`/`free_page_frame`, internal buddy/PCP
//! structure hidden): the table talks to its allocator the same way.

use core::any::Any;

/// The typed allocation service backing slot-array growth. A production
/// implementation routes this through the owning process's memory
/// subsystem and may refuse growth (e.g. process over quota); the table
/// never allocates raw memory itself — it only grows its `Vec` once the
/// arena has agreed to back the new capacity.
pub trait SlotArena: Send + Sync {
    /// Called before the table grows to `total_slots` slots. `owner` is the
    /// opaque process object the table is attached to; `tag` is the fixed
    /// allocation tag for handle-table storage. Returning `false` causes the
    /// growth to fail with [`crate::error::HandleError::NoMemory`].
    fn reserve(&self, owner: &dyn Any, tag: &'static str, total_slots: usize) -> bool;
}

/// Backs standalone/test tables with the ordinary global allocator and no
/// quota accounting.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSlotArena;

impl SlotArena for DefaultSlotArena {
    #[inline]
    fn reserve(&self, _owner: &dyn Any, _tag: &'static str, _total_slots: usize) -> bool {
        true
    }
}

/// The process-wide lock-order registry used to detect inversion. Purely
/// advisory (spec §5): this table imposes no internal ordering beyond being
/// a single leaf in whatever order the registry enforces.
pub trait LockOrderRegistry: Send + Sync {
    fn acquire(&self, kind: &'static str);
    fn release(&self, kind: &'static str);
}

/// No-op registry for standalone/test tables that don't participate in a
/// larger lock-ordering scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLockOrder;

impl LockOrderRegistry for NullLockOrder {
    #[inline]
    fn acquire(&self, _kind: &'static str) {}
    #[inline]
    fn release(&self, _kind: &'static str) {}
}
