/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::step::CombinedStep;
use crate::{ApplicationVersion, ClientRequestId};
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use io::ErrorKind;
use lockstep_blob_stream::prelude::ReceiverToSenderCommands;
use lockstep_step_id::StepId;
use std::fmt::Display;
use std::{fmt, io};

#[repr(u8)]
enum ClientToServerCommand {
    JoinGame = 0x01,
    GameStep = 0x02,
    DownloadGameState = 0x03,
    DownloadGameStateStatus = 0x04,
}

impl TryFrom<u8> for ClientToServerCommand {
    type Error = io::Error;

    fn try_from(value: u8) -> io::Result<Self> {
        Ok(match value {
            0x01 => Self::JoinGame,
            0x02 => Self::GameStep,
            0x03 => Self::DownloadGameState,
            0x04 => Self::DownloadGameStateStatus,
            _ => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("Unknown ClientToServerCommand {value}"),
            ))?,
        })
    }
}

/// Request to join the game with one or more local players. Idempotent per
/// transport connection.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct JoinGameRequest {
    pub client_request_id: ClientRequestId,
    pub local_indices: Vec<u8>,
}

impl JoinGameRequest {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        stream.write_u8(self.local_indices.len() as u8)?;
        for local_index in &self.local_indices {
            stream.write_u8(*local_index)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let client_request_id = ClientRequestId::deserialize(stream)?;
        let count = stream.read_u8()?;
        let mut local_indices = Vec::with_capacity(count as usize);
        for _ in 0..count {
            local_indices.push(stream.read_u8()?);
        }
        Ok(Self {
            client_request_id,
            local_indices,
        })
    }
}

/// Predicted steps from one connection plus its acknowledgement of
/// authoritative progress (`waiting_for_step_id`).
#[derive(Debug, PartialEq, Clone)]
pub struct GameStepRequest {
    pub waiting_for_step_id: StepId,
    pub first_predicted_step_id: StepId,
    pub predicted_steps: Vec<CombinedStep>,
}

impl Display for GameStepRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "game-step waiting:{} first:{} count:{}",
            self.waiting_for_step_id,
            self.first_predicted_step_id,
            self.predicted_steps.len()
        )
    }
}

impl GameStepRequest {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.waiting_for_step_id.to_stream(stream)?;
        self.first_predicted_step_id.to_stream(stream)?;
        stream.write_u8(self.predicted_steps.len() as u8)?;
        for combined_step in &self.predicted_steps {
            combined_step.serialize(stream)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let waiting_for_step_id = StepId::from_stream(stream)?;
        let first_predicted_step_id = StepId::from_stream(stream)?;
        let count = stream.read_u8()?;
        let mut predicted_steps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            predicted_steps.push(CombinedStep::deserialize(stream)?);
        }
        Ok(Self {
            waiting_for_step_id,
            first_predicted_step_id,
            predicted_steps,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DownloadGameStateRequest {
    pub client_request_id: ClientRequestId,
    pub application_version: ApplicationVersion,
}

impl DownloadGameStateRequest {
    /// # Errors
    ///
    /// `io::Error` when the stream can not be written to.
    pub fn to_stream(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        self.client_request_id.serialize(stream)?;
        self.application_version.to_stream(stream)
    }

    /// # Errors
    ///
    /// `io::Error` when the stream can not be read from.
    pub fn from_stream(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        Ok(Self {
            client_request_id: ClientRequestId::deserialize(stream)?,
            application_version: ApplicationVersion::from_stream(stream)?,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ClientToServerCommands {
    JoinGame(JoinGameRequest),
    GameStep(GameStepRequest),
    DownloadGameState(DownloadGameStateRequest),
    DownloadGameStateStatus(ReceiverToSenderCommands),
}

impl Serialize for ClientToServerCommands {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        stream.write_u8(self.to_octet())?;
        match self {
            Self::JoinGame(request) => request.to_stream(stream),
            Self::GameStep(request) => request.to_stream(stream),
            Self::DownloadGameState(request) => request.to_stream(stream),
            Self::DownloadGameStateStatus(status) => status.to_stream(stream),
        }
    }
}

impl Deserialize for ClientToServerCommands {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let command_value = stream.read_u8()?;
        let command = ClientToServerCommand::try_from(command_value)?;
        let x = match command {
            ClientToServerCommand::JoinGame => Self::JoinGame(JoinGameRequest::from_stream(stream)?),
            ClientToServerCommand::GameStep => Self::GameStep(GameStepRequest::from_stream(stream)?),
            ClientToServerCommand::DownloadGameState => {
                Self::DownloadGameState(DownloadGameStateRequest::from_stream(stream)?)
            }
            ClientToServerCommand::DownloadGameStateStatus => {
                Self::DownloadGameStateStatus(ReceiverToSenderCommands::from_stream(stream)?)
            }
        };
        Ok(x)
    }
}

impl ClientToServerCommands {
    #[must_use]
    pub const fn to_octet(&self) -> u8 {
        match self {
            Self::JoinGame(_) => ClientToServerCommand::JoinGame as u8,
            Self::GameStep(_) => ClientToServerCommand::GameStep as u8,
            Self::DownloadGameState(_) => ClientToServerCommand::DownloadGameState as u8,
            Self::DownloadGameStateStatus(_) => ClientToServerCommand::DownloadGameStateStatus as u8,
        }
    }
}

impl Display for ClientToServerCommands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinGame(request) => write!(f, "join {request:?}"),
            Self::GameStep(request) => write!(f, "steps {request}"),
            Self::DownloadGameState(request) => write!(f, "download game state {request:?}"),
            Self::DownloadGameStateStatus(status) => write!(f, "download status {status:?}"),
        }
    }
}
