//! Named constants for the handle table.
//!
//! Mirrors the re-export style of `slopos_mm::mm_constants`, except these
//! values have no upstream ABI source — they are local to this component.

/// Lower bound on `free_count` maintained by proactive growth. Provides the
/// temporal gap that makes a 2-bit generation counter sufficient to catch
/// use-after-free (see spec §4.3 rationale).
pub const MIN_FREE_ENTRIES: u32 = 128;

/// Fixed growth increment applied every time the table expands.
pub const GROWTH_INCREMENT: u32 = 1024;

/// Width of the index field, in bits.
pub const INDEX_BITS: u32 = 24;

/// Largest representable slot index.
pub const MAX_INDEX: u32 = (1 << INDEX_BITS) - 1;

/// Largest representable table size (one past `MAX_INDEX`).
pub const MAX_SIZE: u32 = 1 << INDEX_BITS;

/// Mask covering the raw (unshifted) index value.
pub const INDEX_MASK: u32 = MAX_INDEX;

/// Free-list terminator: any value outside `0..MAX_SIZE`. Chosen as the
/// bitwise complement of `INDEX_MASK` per spec §3.
pub const INVALID_INDEX: u32 = !INDEX_MASK;

/// Largest object-type tag a caller may register. `FREE` (0) stays reserved;
/// every other `u8` value is a valid type. See DESIGN.md for why this Open
/// Question resolves to `u8::MAX` rather than a narrower limit.
pub const TYPE_LIMIT: u8 = u8::MAX;

/// Tag passed to [`crate::external::SlotArena::reserve`] for this table's
/// backing storage, matching spec §4.2's fixed `HANDLE_TABLE` allocator tag.
pub const ALLOCATOR_TAG: &str = "HANDLE_TABLE";

/// Tag registered with the [`crate::external::LockOrderRegistry`] while the
/// table's lock is held.
pub const LOCK_ORDER_TAG: &str = "HANDLETABLE";
