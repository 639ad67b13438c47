/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-steps

A [`StepStore`] is a dense, fixed-capacity ring of per-tick items keyed by a
monotonically increasing [`StepId`]. Writes are only accepted at
`expected_write_id`, reads happen from `expected_read_id` forward, so the
stored range never has holes. Whoever fills the store is responsible for
synthesizing a step before writing when a producer had nothing to offer.
*/

use lockstep_step_id::StepId;
use std::collections::VecDeque;
use std::fmt::{Debug, Display, Formatter};

/// Window of steps a store keeps before writers are refused.
pub const STEP_WINDOW_SIZE: usize = 64;

#[derive(Debug, PartialEq, Clone)]
pub struct StepInfo<T> {
    pub step: T,
    pub step_id: StepId,
}

impl<T: Display> Display for StepInfo<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step_id, self.step)
    }
}

#[derive(Debug)]
pub enum StepStoreError {
    WrongStepId {
        expected: StepId,
        encountered: StepId,
    },
    StoreIsFull {
        capacity: usize,
    },
}

impl Display for StepStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongStepId {
                expected,
                encountered,
            } => write!(f, "wrong step id, expected {expected} got {encountered}"),
            Self::StoreIsFull { capacity } => write!(f, "store is full (capacity {capacity})"),
        }
    }
}

#[derive(Debug)]
pub struct StepStore<T> {
    steps: VecDeque<StepInfo<T>>,
    expected_read_id: StepId,
    expected_write_id: StepId,
    capacity: usize,
}

impl<T: Clone> StepStore<T> {
    #[must_use]
    pub fn new(step_id: StepId) -> Self {
        Self::with_capacity(step_id, STEP_WINDOW_SIZE)
    }

    #[must_use]
    pub fn with_capacity(step_id: StepId, capacity: usize) -> Self {
        Self {
            steps: VecDeque::with_capacity(capacity),
            expected_read_id: step_id,
            expected_write_id: step_id,
            capacity,
        }
    }

    /// Drops every stored step and restarts the ring at `step_id`.
    pub fn reinit(&mut self, step_id: StepId) {
        self.steps.clear();
        self.expected_read_id = step_id;
        self.expected_write_id = step_id;
    }

    /// # Errors
    ///
    /// Fails when `step_id` is not exactly `expected_write_id` or the ring is
    /// full. The store is left unchanged in both cases.
    pub fn push_with_check(&mut self, step_id: StepId, step: T) -> Result<(), StepStoreError> {
        if step_id != self.expected_write_id {
            return Err(StepStoreError::WrongStepId {
                expected: self.expected_write_id,
                encountered: step_id,
            });
        }
        if self.steps.len() >= self.capacity {
            return Err(StepStoreError::StoreIsFull {
                capacity: self.capacity,
            });
        }

        self.steps.push_back(StepInfo { step, step_id });
        self.expected_write_id = self.expected_write_id.next();
        Ok(())
    }

    pub fn pop(&mut self) -> Option<StepInfo<T>> {
        let info = self.steps.pop_front();
        if let Some(ref step_info) = info {
            debug_assert_eq!(step_info.step_id, self.expected_read_id);
            self.expected_read_id = self.expected_read_id.next();
        }
        info
    }

    #[must_use]
    pub fn get(&self, step_id: StepId) -> Option<&T> {
        let offset = step_id.delta(self.expected_read_id);
        if offset < 0 {
            return None;
        }
        self.steps.get(offset as usize).map(|info| &info.step)
    }

    pub fn discard_count(&mut self, count: usize) {
        let count = count.min(self.steps.len());
        self.steps.drain(..count);
        self.expected_read_id += count as u32;
    }

    /// Discards every step strictly older than `step_id`.
    pub fn discard_up_to(&mut self, step_id: StepId) {
        while let Some(info) = self.steps.front() {
            if info.step_id.is_at_or_after(step_id) {
                break;
            }
            self.steps.pop_front();
            self.expected_read_id = self.expected_read_id.next();
        }
    }

    /// Iterates stored steps starting at `from_id`, at most `max_count` items.
    /// Steps older than the ring start are not yielded.
    pub fn range_iter(
        &self,
        from_id: StepId,
        max_count: usize,
    ) -> impl Iterator<Item = &StepInfo<T>> {
        let offset = from_id.delta(self.expected_read_id).max(0) as usize;
        self.steps.iter().skip(offset).take(max_count)
    }

    #[must_use]
    pub fn front_step_id(&self) -> Option<StepId> {
        self.steps.front().map(|info| info.step_id)
    }

    #[must_use]
    pub const fn expected_read_id(&self) -> StepId {
        self.expected_read_id
    }

    #[must_use]
    pub const fn expected_write_id(&self) -> StepId {
        self.expected_write_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.capacity
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
