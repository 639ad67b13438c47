/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-step-id

A `StepId` identifies one simulation tick. It is a 32-bit counter that wraps
around, so every comparison must go through [`StepId::delta`], which interprets
the distance between two ids as a signed 32-bit value. That keeps a long-running
session working across the rollover (roughly 49 days at 1 kHz).

`StepId` intentionally does not implement `Ord`; comparing raw ids with `<`
breaks at the wrap and is therefore not expressible.
*/

use flood_rs::{ReadOctetStream, WriteOctetStream};
use std::ops::{Add, AddAssign};
use std::{fmt, io};

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StepId(pub u32);

impl StepId {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn inner(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Signed distance from `other` to `self`. Positive means `self` is ahead.
    #[must_use]
    pub const fn delta(self, other: Self) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    #[must_use]
    pub const fn is_before(self, other: Self) -> bool {
        self.delta(other) < 0
    }

    #[must_use]
    pub const fn is_at_or_after(self, other: Self) -> bool {
        self.delta(other) >= 0
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u32(self.0)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self(stream.read_u32()?))
    }
}

impl Add<u32> for StepId {
    type Output = Self;
    fn add(self, rhs: u32) -> Self {
        Self(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u32> for StepId {
    fn add_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({:08X})", self.0)
    }
}
