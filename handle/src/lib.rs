#![no_std]
#![forbid(unsafe_code)]

//! Generational handle table: issues opaque 32-bit handles for kernel-side
//! objects and resolves them back with use-after-free and type-confusion
//! protection.
//!
//! A handle packs an `index` into the table's slot array, a 2-bit
//! `generation` that increments on every free so a stale handle from a
//! reused slot fails validation, and a caller-controlled `instance` tag
//! this table never interprets. See [`codec`] for the bit layout and
//! [`table`] for the table itself.
//!
//! This crate has no dependency on any other SlopOS subsystem crate; the
//! process-typed allocator and lock-order registry a real table needs are
//! consumed through the [`external::SlotArena`] and
//! [`external::LockOrderRegistry`] traits, with no-op defaults for
//! standalone use.

extern crate alloc;

pub mod codec;
pub mod config;
pub mod error;
pub mod external;
mod slot;
pub mod table;

#[cfg(feature = "itests")]
pub mod itests;

pub use codec::Handle;
pub use error::{HandleError, HandleResult};
pub use external::{DefaultSlotArena, LockOrderRegistry, NullLockOrder, SlotArena};
pub use slot::{FREE, ObjectRef, ObjectType};
pub use table::{Owner, Table, TableReadGuard, TableWriteGuard};
