/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use std::io::Result;

/// Small integer identifying a transport-level session. Stable for the
/// lifetime of the session.
pub type ConnectionIndex = u8;

pub trait MultiDatagramReceiver {
    /// Polls for one datagram, non-blocking.
    ///
    /// Stores the payload into `buffer` and returns the connection index plus
    /// the octet count, or `None` when nothing is pending.
    fn receive_from(&mut self, buffer: &mut [u8]) -> Result<Option<(ConnectionIndex, usize)>>;
}

pub trait MultiDatagramSender {
    /// Sends a datagram of up to 1200 octets to the given connection,
    /// best-effort and non-blocking.
    fn send_to(&mut self, connection_index: ConnectionIndex, data: &[u8]) -> Result<()>;
}

/// A trait that combines sending and receiving datagrams on a transport that
/// multiplexes several connections.
pub trait MultiDatagramTransport: MultiDatagramSender + MultiDatagramReceiver {}

impl<T: MultiDatagramSender + MultiDatagramReceiver> MultiDatagramTransport for T {}
