/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::{ReadOctetStream, WriteOctetStream};
use std::fmt::Display;
use std::io;
use std::io::ErrorKind;

/// Stream channel a transfer runs on. Channels are handed out by the sender,
/// counting down from 127.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.0)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StartTransferData {
    pub channel: ChannelId,
    pub total_octet_size: u32,
    pub chunk_size: u16,
}

impl StartTransferData {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.channel.to_stream(stream)?;
        stream.write_u32(self.total_octet_size)?;
        stream.write_u16(self.chunk_size)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            channel: ChannelId::from_stream(stream)?,
            total_octet_size: stream.read_u32()?,
            chunk_size: stream.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetChunkData {
    pub channel: ChannelId,
    pub chunk_index: u32,
    pub payload: Vec<u8>,
}

impl SetChunkData {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.channel.to_stream(stream)?;
        stream.write_u32(self.chunk_index)?;
        stream.write_u16(self.payload.len() as u16)?;
        stream.write(&self.payload[..])?;
        Ok(())
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let channel = ChannelId::from_stream(stream)?;
        let chunk_index = stream.read_u32()?;
        let octet_length = stream.read_u16()?;
        let mut payload = vec![0u8; octet_length as usize];
        stream.read(&mut payload)?;

        Ok(Self {
            channel,
            chunk_index,
            payload,
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AckChunkData {
    pub channel: ChannelId,
    /// First chunk index the receiver has not received fully in sequence.
    pub waiting_for_chunk_index: u32,
    /// Receive bit mask for the chunks after `waiting_for_chunk_index`.
    pub receive_mask_after_last: u64,
}

impl AckChunkData {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.channel.to_stream(stream)?;
        stream.write_u32(self.waiting_for_chunk_index)?;
        stream.write_u64(self.receive_mask_after_last)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            channel: ChannelId::from_stream(stream)?,
            waiting_for_chunk_index: stream.read_u32()?,
            receive_mask_after_last: stream.read_u64()?,
        })
    }
}

#[repr(u8)]
enum SenderToReceiverCommand {
    StartTransfer = 0x01,
    SetChunk = 0x02,
}

impl TryFrom<u8> for SenderToReceiverCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x01 => Self::StartTransfer,
            0x02 => Self::SetChunk,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown SenderToReceiverCommand {value}"),
            ))?,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SenderToReceiverCommands {
    StartTransfer(StartTransferData),
    SetChunk(SetChunkData),
}

impl Display for SenderToReceiverCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartTransfer(start) => write!(f, "start transfer {start:?}"),
            Self::SetChunk(set_chunk) => write!(
                f,
                "set_chunk {} index:{} chunk_size:{}",
                set_chunk.channel,
                set_chunk.chunk_index,
                set_chunk.payload.len()
            ),
        }
    }
}

impl SenderToReceiverCommands {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::StartTransfer(_) => SenderToReceiverCommand::StartTransfer as u8,
            Self::SetChunk(_) => SenderToReceiverCommand::SetChunk as u8,
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::StartTransfer(start) => start.to_stream(stream),
            Self::SetChunk(set_chunk) => set_chunk.to_stream(stream),
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        let command = SenderToReceiverCommand::try_from(command_value)?;
        let x = match command {
            SenderToReceiverCommand::StartTransfer => {
                Self::StartTransfer(StartTransferData::from_stream(stream)?)
            }
            SenderToReceiverCommand::SetChunk => Self::SetChunk(SetChunkData::from_stream(stream)?),
        };
        Ok(x)
    }
}

#[repr(u8)]
enum ReceiverToSenderCommand {
    AckStart = 0x03,
    AckChunk = 0x04,
}

impl TryFrom<u8> for ReceiverToSenderCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x03 => Self::AckStart,
            0x04 => Self::AckChunk,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown ReceiverToSenderCommand {value}"),
            ))?,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReceiverToSenderCommands {
    AckStart(ChannelId),
    AckChunk(AckChunkData),
}

impl ReceiverToSenderCommands {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::AckStart(_) => ReceiverToSenderCommand::AckStart as u8,
            Self::AckChunk(_) => ReceiverToSenderCommand::AckChunk as u8,
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::AckStart(channel) => channel.to_stream(stream),
            Self::AckChunk(ack) => ack.to_stream(stream),
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        let command = ReceiverToSenderCommand::try_from(command_value)?;
        let x = match command {
            ReceiverToSenderCommand::AckStart => Self::AckStart(ChannelId::from_stream(stream)?),
            ReceiverToSenderCommand::AckChunk => Self::AckChunk(AckChunkData::from_stream(stream)?),
        };
        Ok(x)
    }
}
