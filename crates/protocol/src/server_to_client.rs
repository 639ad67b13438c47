/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::step::CombinedStep;
use crate::{ClientRequestId, SessionNonce};
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use io::ErrorKind;
use lockstep_blob_stream::prelude::{ChannelId, SenderToReceiverCommands};
use lockstep_participant::ParticipantId;
use lockstep_step_id::StepId;
use std::fmt::{Display, Formatter};
use std::io;

#[repr(u8)]
enum ServerToClientCommand {
    GameStep = 0x08,
    JoinGame = 0x09,
    DownloadGameState = 0x0B,
    GameStatePart = 0x0C,
}

impl TryFrom<u8> for ServerToClientCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x08 => Self::GameStep,
            0x09 => Self::JoinGame,
            0x0B => Self::DownloadGameState,
            0x0C => Self::GameStatePart,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown ServerToClientCommand 0x{value:0X}"),
            ))?,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct JoinGameParticipant {
    pub local_index: u8,
    pub participant_id: ParticipantId,
}

impl JoinGameParticipant {
    fn to_stream(self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.local_index)?;
        self.participant_id.serialize(stream)
    }

    fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            local_index: stream.read_u8()?,
            participant_id: ParticipantId::deserialize(stream)?,
        })
    }
}

/// Reply to a join request. An empty participant list means the join was
/// refused (no free participant slots).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JoinGameResponse {
    pub client_request_id: ClientRequestId,
    pub session_nonce: SessionNonce,
    pub participants: Vec<JoinGameParticipant>,
}

impl Display for JoinGameResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "join-response {} {} participants:{}",
            self.client_request_id,
            self.session_nonce,
            self.participants.len()
        )
    }
}

impl JoinGameResponse {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        self.session_nonce.to_stream(stream)?;
        stream.write_u8(self.participants.len() as u8)?;
        for participant in &self.participants {
            participant.to_stream(stream)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let client_request_id = ClientRequestId::deserialize(stream)?;
        let session_nonce = SessionNonce::from_stream(stream)?;
        let count = stream.read_u8()?;
        let mut participants = Vec::with_capacity(count as usize);
        for _ in 0..count {
            participants.push(JoinGameParticipant::from_stream(stream)?);
        }
        Ok(Self {
            client_request_id,
            session_nonce,
            participants,
        })
    }
}

/// A contiguous range of authoritative steps, starting at the step id the
/// client said it was waiting for. An empty range with a start behind the
/// server's window tells the client it must re-download the game state.
#[derive(Debug, PartialEq, Clone)]
pub struct GameStepResponse {
    pub start_step_id: StepId,
    pub authoritative_steps: Vec<CombinedStep>,
}

impl Display for GameStepResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "game-step-response start:{} count:{}",
            self.start_step_id,
            self.authoritative_steps.len()
        )
    }
}

impl GameStepResponse {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.start_step_id.to_stream(stream)?;
        stream.write_u8(self.authoritative_steps.len() as u8)?;
        for combined_step in &self.authoritative_steps {
            combined_step.serialize(stream)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let start_step_id = StepId::from_stream(stream)?;
        let count = stream.read_u8()?;
        let mut authoritative_steps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            authoritative_steps.push(CombinedStep::deserialize(stream)?);
        }
        Ok(Self {
            start_step_id,
            authoritative_steps,
        })
    }
}

#[repr(u8)]
enum DownloadGameStateResultValue {
    Begin = 0x00,
    WrongApplicationVersion = 0x01,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DownloadGameStateResult {
    Begin {
        blob_channel: ChannelId,
        total_octet_count: u32,
        step_id: StepId,
    },
    WrongApplicationVersion,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DownloadGameStateResponse {
    pub client_request_id: ClientRequestId,
    pub result: DownloadGameStateResult,
}

impl Display for DownloadGameStateResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "download-game-state-response {} {:?}",
            self.client_request_id, self.result
        )
    }
}

impl DownloadGameStateResponse {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        match &self.result {
            DownloadGameStateResult::Begin {
                blob_channel,
                total_octet_count,
                step_id,
            } => {
                stream.write_u8(DownloadGameStateResultValue::Begin as u8)?;
                blob_channel.to_stream(stream)?;
                stream.write_u32(*total_octet_count)?;
                step_id.to_stream(stream)
            }
            DownloadGameStateResult::WrongApplicationVersion => {
                stream.write_u8(DownloadGameStateResultValue::WrongApplicationVersion as u8)
            }
        }
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let client_request_id = ClientRequestId::deserialize(stream)?;
        let result_value = stream.read_u8()?;
        let result = match result_value {
            0x00 => DownloadGameStateResult::Begin {
                blob_channel: ChannelId::from_stream(stream)?,
                total_octet_count: stream.read_u32()?,
                step_id: StepId::from_stream(stream)?,
            },
            0x01 => DownloadGameStateResult::WrongApplicationVersion,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown download result {result_value}"),
            ))?,
        };
        Ok(Self {
            client_request_id,
            result,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ServerToClientCommands {
    GameStep(GameStepResponse),
    JoinGame(JoinGameResponse),
    DownloadGameState(DownloadGameStateResponse),
    GameStatePart(SenderToReceiverCommands),
}

impl Serialize for ServerToClientCommands {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::GameStep(response) => response.to_stream(stream),
            Self::JoinGame(response) => response.to_stream(stream),
            Self::DownloadGameState(response) => response.to_stream(stream),
            Self::GameStatePart(part) => part.to_stream(stream),
        }
    }
}

impl Deserialize for ServerToClientCommands {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        let command = ServerToClientCommand::try_from(command_value)?;
        let x = match command {
            ServerToClientCommand::GameStep => Self::GameStep(GameStepResponse::from_stream(stream)?),
            ServerToClientCommand::JoinGame => Self::JoinGame(JoinGameResponse::from_stream(stream)?),
            ServerToClientCommand::DownloadGameState => {
                Self::DownloadGameState(DownloadGameStateResponse::from_stream(stream)?)
            }
            ServerToClientCommand::GameStatePart => {
                Self::GameStatePart(SenderToReceiverCommands::from_stream(stream)?)
            }
        };
        Ok(x)
    }
}

impl ServerToClientCommands {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::GameStep(_) => ServerToClientCommand::GameStep as u8,
            Self::JoinGame(_) => ServerToClientCommand::JoinGame as u8,
            Self::DownloadGameState(_) => ServerToClientCommand::DownloadGameState as u8,
            Self::GameStatePart(_) => ServerToClientCommand::GameStatePart as u8,
        }
    }
}

impl Display for ServerToClientCommands {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GameStep(response) => write!(f, "GameStepResponse({response})"),
            Self::JoinGame(response) => write!(f, "JoinGameResponse({response})"),
            Self::DownloadGameState(response) => write!(f, "DownloadGameState({response})"),
            Self::GameStatePart(part) => write!(f, "GameStatePart({part})"),
        }
    }
}
