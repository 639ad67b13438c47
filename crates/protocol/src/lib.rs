/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-protocol

Wire commands exchanged between a lockstep client and the authoritative
server. Every datagram carries a sequence octet and a reserved octet, then one
or more commands; each command starts with its command octet. All encoding
goes through `flood-rs` octet streams.
*/

use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use std::fmt;
use std::io::Result;

pub mod client_to_server;
pub mod prelude;
pub mod server_to_client;
pub mod step;

/// Client-chosen id echoed back in the matching response, so the client can
/// pair a response with its request after datagram loss.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ClientRequestId(pub u8);

impl fmt::Display for ClientRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({:X})", self.0)
    }
}

impl Serialize for ClientRequestId {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> Result<()> {
        stream.write_u8(self.0)
    }
}

impl Deserialize for ClientRequestId {
    fn deserialize(stream: &mut impl ReadOctetStream) -> Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}

/// Application-level deterministic simulation version. Downloading a game
/// state only makes sense when client and server agree on it exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApplicationVersion(pub u32);

impl ApplicationVersion {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(self, stream: &mut impl WriteOctetStream) -> Result<()> {
        stream.write_u32(self.0)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> Result<Self> {
        Ok(Self(stream.read_u32()?))
    }
}

impl fmt::Display for ApplicationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-version {}", self.0)
    }
}

/// Identity of one join, handed out by the server and echoed by the client
/// when it needs to prove it is the same party.
#[derive(PartialEq, Copy, Clone, Eq)]
pub struct SessionNonce(pub u64);

impl SessionNonce {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(self, stream: &mut impl WriteOctetStream) -> Result<()> {
        stream.write_u64(self.0)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> Result<Self> {
        Ok(Self(stream.read_u64()?))
    }
}

impl fmt::Display for SessionNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_nonce: {:X}", self.0)
    }
}

impl fmt::Debug for SessionNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_nonce: {:X}", self.0)
    }
}
