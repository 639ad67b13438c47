/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-ordered-datagram

Every datagram carries a single wrapping `u8` sequence id per direction.
Inbound datagrams that are at or ahead of the expected sequence (in the signed
eight-bit sense) are accepted and re-latch the expectation; older ones are
dropped. There is no acknowledgement and no retransmit: the payloads carry
their own step ids, so losing or reordering a datagram only costs stale
protocol state, never correctness.
*/

use flood_rs::{ReadOctetStream, WriteOctetStream};
use std::{fmt, io};

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct SequenceId(pub u8);

impl SequenceId {
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn inner(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Signed distance from `other` to `self` in wrapping eight-bit space.
    #[must_use]
    pub const fn delta(self, other: Self) -> i8 {
        self.0.wrapping_sub(other.0) as i8
    }

    fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.0)
    }

    fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceId({:X})", self.0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedOut {
    pub sequence_to_send: SequenceId,
}

impl OrderedOut {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sequence_to_send: SequenceId(0),
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.sequence_to_send.to_stream(stream)
    }

    pub fn commit(&mut self) {
        self.sequence_to_send = self.sequence_to_send.next();
    }
}

#[derive(Debug)]
pub enum DatagramOrderInError {
    IoError(io::Error),
    WrongOrder {
        expected: SequenceId,
        received: SequenceId,
    },
}

impl fmt::Display for DatagramOrderInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(err) => write!(f, "io: {err}"),
            Self::WrongOrder { expected, received } => {
                write!(f, "out of order, expected {expected} received {received}")
            }
        }
    }
}

impl From<io::Error> for DatagramOrderInError {
    fn from(e: io::Error) -> Self {
        Self::IoError(e)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrderedIn {
    has_received_initial: bool,
    expected_sequence: SequenceId,
}

impl OrderedIn {
    /// Reads one sequence octet and checks it against the expectation.
    ///
    /// The very first datagram is always accepted and latches the expectation.
    /// Returns how many datagrams the accepted one skipped past, which the
    /// caller can feed into a drop metric.
    ///
    /// # Errors
    ///
    /// `DatagramOrderInError::WrongOrder` for a stale datagram; the caller is
    /// expected to drop it silently.
    pub fn read_and_verify(
        &mut self,
        stream: &mut impl ReadOctetStream,
    ) -> Result<u8, DatagramOrderInError> {
        let received = SequenceId::from_stream(stream)?;

        if !self.has_received_initial {
            self.has_received_initial = true;
            self.expected_sequence = received.next();
            return Ok(0);
        }

        let diff = received.delta(self.expected_sequence);
        if diff >= 0 {
            self.expected_sequence = received.next();
            Ok(diff as u8)
        } else {
            Err(DatagramOrderInError::WrongOrder {
                expected: self.expected_sequence,
                received,
            })
        }
    }

    #[must_use]
    pub const fn has_received_initial(&self) -> bool {
        self.has_received_initial
    }

    #[must_use]
    pub const fn expected_sequence(&self) -> SequenceId {
        self.expected_sequence
    }
}
