/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    err::{BlobError, OutStreamError},
    in_logic::{InLogic, InLogicFront},
    out_logic::{OutLogic, OutLogicFront},
    protocol::{
        AckChunkData, ChannelId, ReceiverToSenderCommands, SenderToReceiverCommands, SetChunkData,
        StartTransferData,
    },
    ChunkIndex,
};
