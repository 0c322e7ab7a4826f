//! End-to-end scenario tests, gated behind the `itests` feature like every
//! other SlopOS subsystem's scenario suite (`mm::tests`, `boot::gdt_tests`).
//! Each function is a standalone `TestResult` producer meant to be wired
//! into a kernel-side suite via `slopos_lib::define_test_suite!`; this
//! crate has no boot sequencing of its own, so it only supplies the
//! functions.

use alloc::string::String;
use alloc::sync::Arc;

use slopos_lib::testing::TestResult;
use slopos_lib::{assert_eq_test, assert_test, fail, pass};

use crate::codec::{Handle, encode};
use crate::error::HandleError;
use crate::slot::ObjectRef;
use crate::table::{Owner, Table};

const T1: crate::ObjectType = 1;

fn owner() -> Owner {
    Arc::new(String::from("itest-process"))
}

fn obj(tag: &'static str) -> ObjectRef {
    Arc::new(tag)
}

/// Scenario 1: fresh alloc on an empty table.
pub fn test_fresh_alloc() -> TestResult {
    let table = Table::new_default(owner());
    let h1 = table.alloc_handle_safe(obj("A"), T1, true);

    assert_test!(!h1.is_null(), "first alloc returned the null handle");
    assert_eq_test!(h1.index(), 0, "first handle index");
    assert_eq_test!(h1.generation(), 1, "first handle generation");
    assert_eq_test!(h1.get_instance(), 0, "first handle instance");
    assert_test!(table.get_object(h1).is_some(), "get_object(h1) missing");
    assert_eq_test!(table.used_entry_count(), 1, "used_entry_count after one alloc");

    {
        let g = table.read();
        if g.used_entry_count() != 1 {
            return fail!("used_entry_count via guard disagreed with Table");
        }
    }

    pass!()
}

/// Scenario 2: a freed handle stays invalid across 200 unrelated alloc/free
/// cycles, since `MIN_FREE_ENTRIES` bounds how quickly a slot's index can
/// come back around with a colliding generation.
pub fn test_stale_detection() -> TestResult {
    let table = Table::new_default(owner());
    let h1 = table.alloc_handle_safe(obj("A"), T1, true);
    table.free_handle_safe(T1, h1);
    assert_test!(table.get_object(h1).is_none(), "h1 valid immediately after free");

    for _ in 0..200 {
        let h = table.alloc_handle_safe(obj("B"), T1, true);
        table.free_handle_safe(T1, h);
    }

    assert_test!(
        table.get_object(h1).is_none(),
        "h1 became valid again after 200 unrelated alloc/free cycles"
    );
    pass!()
}

/// Scenario 3: assigning a caller-chosen handle onto an already-occupied
/// slot with a matching generation is rejected.
pub fn test_assignment_collision() -> TestResult {
    let table = Table::new_default(owner());
    let mut last = Handle::NULL;
    for _ in 0..=5 {
        last = table.alloc_handle_safe(obj("A"), T1, true);
    }

    let target = Handle::from_raw(encode(last.index(), last.generation(), 0));
    match table.assign_handle_safe(obj("B"), T1, target) {
        Err(HandleError::InvalidParameter) => pass!(),
        Err(other) => fail!("expected InvalidParameter, got {:?}", other),
        Ok(()) => fail!("assign_handle accepted a collision with an occupied slot"),
    }
}

/// Scenario 4: assigning beyond the current table size grows it.
pub fn test_assignment_extend() -> TestResult {
    let table = Table::new_default(owner());
    let h = Handle::from_raw(encode(2000, 2, 0));
    if table.assign_handle_safe(obj("A"), T1, h).is_err() {
        return fail!("assign_handle failed to grow the table");
    }

    assert_test!(table.get_object(h).is_some(), "assigned handle not resolvable");
    let g = table.read();
    assert_test!(g.used_entry_count() >= 1, "used_entry_count after assign");
    drop(g);
    pass!()
}

/// Scenario 5: the destroyed-flag protocol round-trips.
pub fn test_destroyed_round_trip() -> TestResult {
    let table = Table::new_default(owner());
    let h = table.alloc_handle_safe(obj("A"), T1, true);

    assert_test!(table.mark_destroyed(h), "mark_destroyed returned false");
    assert_test!(table.get_object(h).is_none(), "destroyed handle still resolves");
    assert_test!(
        table.get_object_ignore_destroyed(h, T1).is_some(),
        "destroyed handle unreachable even with ignore_destroyed"
    );
    assert_test!(table.unmark_destroyed(h), "unmark_destroyed returned false");
    assert_test!(table.get_object(h).is_some(), "handle did not come back after unmark_destroyed");
    pass!()
}

/// Scenario 6: iteration visits each occupied slot exactly once, in
/// ascending index order, skipping slots that were freed again.
pub fn test_iteration() -> TestResult {
    let table = Table::new_default(owner());
    let mut kept = 0usize;
    for i in 0..5 {
        table.alloc_handle_safe(obj("kept"), T1, true);
        kept += 1;
        if i == 2 {
            let doomed = table.alloc_handle_safe(obj("doomed"), T1, true);
            table.free_handle_safe(T1, doomed);
        }
    }

    let guard = table.read();
    let mut cursor = 0u32;
    let mut seen = 0usize;
    let mut last_index: Option<u32> = None;
    while let Some((_ty, h, _obj)) = guard.next_entry(&mut cursor) {
        if let Some(prev) = last_index {
            if h.index() <= prev {
                return fail!("iteration did not proceed in ascending index order");
            }
        }
        last_index = Some(h.index());
        seen += 1;
    }

    assert_eq_test!(seen, kept, "iteration visited the wrong number of live slots");
    pass!()
}
