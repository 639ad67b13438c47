/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::OutStreamError;
use crate::protocol::{ChannelId, SenderToReceiverCommands, SetChunkData, StartTransferData};
use log::{debug, trace};
use monotonic_time_rs::{Millis, MillisDuration};

#[derive(Debug, Clone, Copy)]
struct ChunkSendState {
    sent_at: Option<Millis>,
    acked: bool,
}

/// Sender side of one blob transfer. Owns the blob for the duration of the
/// transfer and resends chunks the receiver has not acknowledged yet.
#[derive(Debug)]
pub struct OutLogic {
    blob: Vec<u8>,
    fixed_chunk_size: u16,
    channel: ChannelId,
    chunks: Vec<ChunkSendState>,
    resend_duration: MillisDuration,
    waiting_for_chunk_index: usize,
}

impl OutLogic {
    /// # Errors
    ///
    /// `OutStreamError::BlobIsTooLarge` when the chunk count does not fit the
    /// wire representation.
    pub fn new(
        channel: ChannelId,
        fixed_chunk_size: u16,
        resend_duration: MillisDuration,
        blob: &[u8],
    ) -> Result<Self, OutStreamError> {
        let chunk_count = blob.len().div_ceil(fixed_chunk_size as usize);
        if u32::try_from(chunk_count).is_err() {
            return Err(OutStreamError::BlobIsTooLarge(blob.len()));
        }

        Ok(Self {
            blob: blob.to_vec(),
            fixed_chunk_size,
            channel,
            chunks: vec![
                ChunkSendState {
                    sent_at: None,
                    acked: false,
                };
                chunk_count
            ],
            resend_duration,
            waiting_for_chunk_index: 0,
        })
    }

    fn chunk_range(&self, index: usize) -> (usize, usize) {
        let start = index * self.fixed_chunk_size as usize;
        let end = (start + self.fixed_chunk_size as usize).min(self.blob.len());
        (start, end)
    }

    /// Picks up to `max_count` chunks that are due: never sent, or sent longer
    /// than the resend duration ago and still unacknowledged.
    pub fn send(&mut self, now: Millis, max_count: usize) -> Vec<SetChunkData> {
        let mut set_chunks = Vec::new();
        for index in self.waiting_for_chunk_index..self.chunks.len() {
            if set_chunks.len() >= max_count {
                break;
            }
            let (start, end) = self.chunk_range(index);
            let chunk = &mut self.chunks[index];
            if chunk.acked {
                continue;
            }
            let is_due = chunk
                .sent_at
                .map_or(true, |sent_at| now - sent_at >= self.resend_duration);
            if !is_due {
                continue;
            }
            chunk.sent_at = Some(now);
            set_chunks.push(SetChunkData {
                channel: self.channel,
                chunk_index: index as u32,
                payload: self.blob[start..end].to_vec(),
            });
        }
        set_chunks
    }

    /// Applies a receiver acknowledgement: everything before
    /// `waiting_for_index` is received, plus the chunks flagged in the mask
    /// (bit 0 maps to `waiting_for_index + 1`).
    ///
    /// # Errors
    ///
    /// `OutStreamError::AckIndexOutOfRange` when the index points past the
    /// transfer.
    pub fn set_waiting_for_chunk_index(
        &mut self,
        waiting_for_index: usize,
        receive_mask: u64,
    ) -> Result<(), OutStreamError> {
        if waiting_for_index > self.chunks.len() {
            return Err(OutStreamError::AckIndexOutOfRange(
                waiting_for_index,
                self.chunks.len(),
            ));
        }

        for chunk in &mut self.chunks[..waiting_for_index] {
            chunk.acked = true;
        }
        self.waiting_for_chunk_index = waiting_for_index;

        let mut mask = receive_mask;
        let mut offset = 0;
        while mask != 0 {
            if mask & 1 != 0 {
                if let Some(chunk) = self.chunks.get_mut(waiting_for_index + 1 + offset) {
                    chunk.acked = true;
                }
            }
            mask >>= 1;
            offset += 1;
        }

        Ok(())
    }

    #[must_use]
    pub fn is_received_by_remote(&self) -> bool {
        self.waiting_for_chunk_index >= self.chunks.len()
    }

    #[must_use]
    pub fn octet_size(&self) -> u32 {
        self.blob.len() as u32
    }

    #[must_use]
    pub const fn chunk_size(&self) -> u16 {
        self.fixed_chunk_size
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Phase {
    StartTransfer,
    Transfer,
}

/// Wraps [`OutLogic`] with the start-of-transfer handshake: the receiver must
/// acknowledge the `StartTransfer` announcement before chunks flow.
#[derive(Debug)]
pub struct OutLogicFront {
    logic: OutLogic,
    phase: Phase,
}

impl OutLogicFront {
    const MAX_CHUNK_COUNT_EACH_SEND: usize = 10;

    /// # Errors
    ///
    /// `OutStreamError` when the blob is too large.
    pub fn new(
        channel: ChannelId,
        fixed_chunk_size: u16,
        resend_duration: MillisDuration,
        blob: &[u8],
    ) -> Result<Self, OutStreamError> {
        Ok(Self {
            logic: OutLogic::new(channel, fixed_chunk_size, resend_duration, blob)?,
            phase: Phase::StartTransfer,
        })
    }

    /// # Errors
    ///
    /// `OutStreamError` when an acknowledgement is malformed.
    pub fn receive(
        &mut self,
        command: &crate::protocol::ReceiverToSenderCommands,
    ) -> Result<(), OutStreamError> {
        use crate::protocol::ReceiverToSenderCommands;
        match command {
            ReceiverToSenderCommands::AckStart(channel) => {
                if self.phase == Phase::StartTransfer {
                    if *channel == self.logic.channel() {
                        debug!("received ack for {channel}, starting transfer");
                        self.phase = Phase::Transfer;
                    } else {
                        debug!("received start ack for wrong channel {channel}");
                    }
                }
            }
            ReceiverToSenderCommands::AckChunk(ack) => {
                if self.phase == Phase::Transfer && ack.channel == self.logic.channel() {
                    self.logic.set_waiting_for_chunk_index(
                        ack.waiting_for_chunk_index as usize,
                        ack.receive_mask_after_last,
                    )?;
                    if self.logic.is_received_by_remote() {
                        trace!("blob fully received by remote on {}", ack.channel);
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn send(&mut self, now: Millis) -> Vec<SenderToReceiverCommands> {
        match self.phase {
            Phase::StartTransfer => {
                debug!("announcing transfer on {}", self.logic.channel());
                vec![SenderToReceiverCommands::StartTransfer(StartTransferData {
                    channel: self.logic.channel(),
                    total_octet_size: self.logic.octet_size(),
                    chunk_size: self.logic.chunk_size(),
                })]
            }
            Phase::Transfer => self
                .logic
                .send(now, Self::MAX_CHUNK_COUNT_EACH_SEND)
                .into_iter()
                .map(SenderToReceiverCommands::SetChunk)
                .collect(),
        }
    }

    #[must_use]
    pub fn is_received_by_remote(&self) -> bool {
        self.logic.is_received_by_remote()
    }

    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.logic.channel()
    }

    #[must_use]
    pub fn octet_size(&self) -> u32 {
        self.logic.octet_size()
    }
}
