/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-blob-stream

Chunked reliable transfer of a binary blob on top of an unreliable datagram
transport. The sender splits the blob into fixed-size chunks and keeps
resending unacknowledged ones on a timer; the receiver tracks received chunks
in a bit array and acknowledges with the first missing chunk index plus a
receive mask. One transfer runs per stream channel.
*/

pub mod err;
pub mod in_logic;
pub mod out_logic;
pub mod prelude;
pub mod protocol;

pub type ChunkIndex = usize;
