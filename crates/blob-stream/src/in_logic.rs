/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::BlobError;
use crate::protocol::{
    AckChunkData, ChannelId, ReceiverToSenderCommands, SenderToReceiverCommands, SetChunkData,
};
use crate::ChunkIndex;
use bit_array_rs::BitArray;
use log::debug;

/// Receiver side of one blob transfer. Collects chunks into the blob buffer
/// and tracks completeness in a bit array.
#[derive(Debug)]
pub struct InLogic {
    bit_array: BitArray,
    fixed_chunk_size: usize,
    octet_count: usize,
    blob: Vec<u8>,
    channel: ChannelId,
}

impl InLogic {
    /// # Panics
    ///
    /// Panics when `fixed_chunk_size` is zero.
    #[must_use]
    pub fn new(channel: ChannelId, octet_count: usize, fixed_chunk_size: usize) -> Self {
        assert!(
            fixed_chunk_size > 0,
            "fixed_chunk_size must be greater than zero"
        );

        let chunk_count = octet_count.div_ceil(fixed_chunk_size);
        Self {
            bit_array: BitArray::new(chunk_count),
            fixed_chunk_size,
            octet_count,
            blob: vec![0u8; octet_count],
            channel,
        }
    }

    /// # Errors
    ///
    /// `BlobError` when the chunk index or payload size is wrong, or a chunk
    /// is resent with different contents.
    pub fn receive(&mut self, chunk: &SetChunkData) -> Result<(), BlobError> {
        let chunk_index = chunk.chunk_index as ChunkIndex;
        let chunk_count = self.bit_array.bit_count();
        if chunk_index >= chunk_count {
            return Err(BlobError::InvalidChunkIndex(chunk_index, chunk_count));
        }

        let expected_size = if chunk_index == chunk_count - 1 {
            let remaining = self.octet_count % self.fixed_chunk_size;
            if remaining == 0 {
                self.fixed_chunk_size
            } else {
                remaining
            }
        } else {
            self.fixed_chunk_size
        };

        if chunk.payload.len() != expected_size {
            return Err(BlobError::UnexpectedChunkSize(
                expected_size,
                chunk.payload.len(),
                chunk_index,
            ));
        }

        let octet_offset = chunk_index * self.fixed_chunk_size;
        if octet_offset + expected_size > self.blob.len() {
            return Err(BlobError::OutOfBounds);
        }

        if self.bit_array.get(chunk_index) {
            let is_same_contents =
                &self.blob[octet_offset..octet_offset + expected_size] == &chunk.payload[..];
            if is_same_contents {
                return Ok(());
            }
            return Err(BlobError::RedundantContentDiffers(chunk_index));
        }

        self.blob[octet_offset..octet_offset + expected_size].copy_from_slice(&chunk.payload);
        self.bit_array.set(chunk_index);

        Ok(())
    }

    #[must_use]
    pub fn ack(&self) -> AckChunkData {
        let waiting_for_chunk_index = self
            .bit_array
            .first_unset_bit()
            .unwrap_or_else(|| self.bit_array.bit_count());

        AckChunkData {
            channel: self.channel,
            waiting_for_chunk_index: waiting_for_chunk_index as u32,
            receive_mask_after_last: self.bit_array.atom_from_index(waiting_for_chunk_index + 1),
        }
    }

    #[must_use]
    pub fn received_chunk_count(&self) -> usize {
        self.bit_array.count_set_bits()
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.bit_array.all_set()
    }

    #[must_use]
    pub fn blob(&self) -> Option<&[u8]> {
        self.is_complete().then(|| &self.blob[..])
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }
}

/// Client-facing receive logic: reacts to the transfer announcement and chunk
/// commands, and produces the matching acknowledgements.
#[derive(Debug, Default)]
pub struct InLogicFront {
    transfer: Option<InLogic>,
}

impl InLogicFront {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// `BlobError` for malformed chunks or chunks outside any transfer.
    pub fn receive(&mut self, command: &SenderToReceiverCommands) -> Result<(), BlobError> {
        match command {
            SenderToReceiverCommands::StartTransfer(start) => {
                let is_same_transfer = self
                    .transfer
                    .as_ref()
                    .is_some_and(|logic| logic.channel() == start.channel);
                if !is_same_transfer {
                    debug!(
                        "starting transfer on {} ({} octets)",
                        start.channel, start.total_octet_size
                    );
                    self.transfer = Some(InLogic::new(
                        start.channel,
                        start.total_octet_size as usize,
                        start.chunk_size as usize,
                    ));
                }
                Ok(())
            }
            SenderToReceiverCommands::SetChunk(chunk) => self
                .transfer
                .as_mut()
                .ok_or(BlobError::NoActiveTransfer)?
                .receive(chunk),
        }
    }

    #[must_use]
    pub fn send(&mut self) -> Option<ReceiverToSenderCommands> {
        let logic = self.transfer.as_ref()?;
        if logic.received_chunk_count() == 0 && !logic.is_complete() {
            Some(ReceiverToSenderCommands::AckStart(logic.channel()))
        } else {
            Some(ReceiverToSenderCommands::AckChunk(logic.ack()))
        }
    }

    #[must_use]
    pub fn blob(&self) -> Option<&[u8]> {
        self.transfer.as_ref().and_then(InLogic::blob)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.transfer.as_ref().is_some_and(InLogic::is_complete)
    }
}
