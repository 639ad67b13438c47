/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_step_id::StepId;

#[test_log::test]
fn delta_ahead_and_behind() {
    let a = StepId::new(10);
    let b = StepId::new(4);
    assert_eq!(a.delta(b), 6);
    assert_eq!(b.delta(a), -6);
    assert!(b.is_before(a));
    assert!(a.is_at_or_after(b));
    assert!(a.is_at_or_after(a));
}

#[test_log::test]
fn delta_survives_rollover() {
    let before_wrap = StepId::new(u32::MAX - 1);
    let after_wrap = StepId::new(2);
    assert_eq!(after_wrap.delta(before_wrap), 4);
    assert!(before_wrap.is_before(after_wrap));
}

#[test_log::test]
fn add_wraps() {
    let id = StepId::new(u32::MAX);
    assert_eq!((id + 1).inner(), 0);

    let mut id = StepId::new(u32::MAX - 2);
    id += 5;
    assert_eq!(id.inner(), 2);
}

#[test_log::test]
fn next_is_plus_one() {
    assert_eq!(StepId::new(41).next(), StepId::new(42));
    assert_eq!(StepId::new(u32::MAX).next(), StepId::new(0));
}
