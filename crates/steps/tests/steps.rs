/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_step_id::StepId;
use lockstep_steps::{StepStore, StepStoreError, STEP_WINDOW_SIZE};

#[test_log::test]
fn push_and_pop_in_order() {
    let mut store = StepStore::new(StepId::new(0x100));

    store.push_with_check(StepId::new(0x100), "first").unwrap();
    store.push_with_check(StepId::new(0x101), "second").unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.expected_write_id(), StepId::new(0x102));

    let info = store.pop().unwrap();
    assert_eq!(info.step, "first");
    assert_eq!(info.step_id, StepId::new(0x100));
    assert_eq!(store.expected_read_id(), StepId::new(0x101));
}

#[test_log::test]
fn push_at_wrong_id_is_refused() {
    let mut store = StepStore::new(StepId::new(10));

    let result = store.push_with_check(StepId::new(12), "gap");
    assert!(matches!(
        result,
        Err(StepStoreError::WrongStepId { expected, encountered })
            if expected == StepId::new(10) && encountered == StepId::new(12)
    ));
    assert!(store.is_empty());
    assert_eq!(store.expected_write_id(), StepId::new(10));
}

#[test_log::test]
fn full_store_refuses_write() {
    let mut store = StepStore::with_capacity(StepId::new(0), 3);
    for i in 0..3 {
        store.push_with_check(StepId::new(i), i).unwrap();
    }
    assert!(store.is_full());

    let result = store.push_with_check(StepId::new(3), 3);
    assert!(matches!(
        result,
        Err(StepStoreError::StoreIsFull { capacity: 3 })
    ));
    assert_eq!(store.len(), 3);
}

#[test_log::test]
fn discard_count_advances_read_id() {
    let mut store = StepStore::new(StepId::new(0x50));
    for i in 0..10u32 {
        store.push_with_check(StepId::new(0x50 + i), i).unwrap();
    }

    store.discard_count(4);
    assert_eq!(store.len(), 6);
    assert_eq!(store.expected_read_id(), StepId::new(0x54));
    assert_eq!(store.front_step_id(), Some(StepId::new(0x54)));

    store.discard_count(100);
    assert!(store.is_empty());
    assert_eq!(store.expected_read_id(), StepId::new(0x5A));
    assert_eq!(store.expected_write_id(), StepId::new(0x5A));
}

#[test_log::test]
fn discard_up_to_leaves_newer_steps() {
    let mut store = StepStore::new(StepId::new(0));
    for i in 0..8u32 {
        store.push_with_check(StepId::new(i), i).unwrap();
    }

    store.discard_up_to(StepId::new(5));
    assert_eq!(store.front_step_id(), Some(StepId::new(5)));
    assert_eq!(store.len(), 3);
}

#[test_log::test]
fn range_iter_is_bounded() {
    let mut store = StepStore::new(StepId::new(100));
    for i in 0..10u32 {
        store.push_with_check(StepId::new(100 + i), i).unwrap();
    }

    let collected: Vec<_> = store
        .range_iter(StepId::new(104), 3)
        .map(|info| info.step)
        .collect();
    assert_eq!(collected, vec![4, 5, 6]);

    assert_eq!(store.range_iter(StepId::new(200), 5).count(), 0);
}

#[test_log::test]
fn survives_step_id_rollover() {
    let start = StepId::new(u32::MAX - 1);
    let mut store = StepStore::new(start);

    store.push_with_check(StepId::new(u32::MAX - 1), "a").unwrap();
    store.push_with_check(StepId::new(u32::MAX), "b").unwrap();
    store.push_with_check(StepId::new(0), "c").unwrap();

    assert_eq!(store.len(), 3);
    assert_eq!(store.expected_write_id(), StepId::new(1));
    assert_eq!(store.get(StepId::new(0)), Some(&"c"));

    store.discard_up_to(StepId::new(0));
    assert_eq!(store.front_step_id(), Some(StepId::new(0)));
}

#[test_log::test]
fn reinit_restarts_the_ring() {
    let mut store = StepStore::new(StepId::new(7));
    store.push_with_check(StepId::new(7), 7).unwrap();

    store.reinit(StepId::new(0x2000));
    assert!(store.is_empty());
    assert_eq!(store.expected_read_id(), StepId::new(0x2000));
    assert_eq!(store.expected_write_id(), StepId::new(0x2000));
    assert_eq!(store.capacity(), STEP_WINDOW_SIZE);
}
