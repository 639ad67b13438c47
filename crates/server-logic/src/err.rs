/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use err_rs::{ErrorLevel, ErrorLevelProvider};
use lockstep_blob_stream::prelude::{ChannelId, OutStreamError};
use lockstep_participant::ParticipantId;
use lockstep_step_id::StepId;
use lockstep_steps::StepStoreError;
use std::io;

#[derive(Debug)]
pub enum ServerLogicError {
    ConnectionCountExceedsLimit(usize),
    ParticipantCountExceedsLimit(usize),
    LocalPlayerCountExceedsLimit(usize),
    StepOctetCountExceedsLimit(usize),
    GameStateOctetCountExceedsLimit(usize),
    ConnectionIndexOutOfRange {
        index: u8,
        max: usize,
    },
    AlreadyConnected(u8),
    UnknownConnectionIndex(u8),
    NoFreeParticipantConnectionSlot,
    ParticipantConnectionReleased(usize),
    NeedJoinGameFirst,
    UnknownParticipant(ParticipantId),
    PredictedStepGap {
        expected: StepId,
        encountered: StepId,
    },
    StepPayloadTooLarge {
        octet_count: usize,
        max: usize,
    },
    BlobChannelStillActive(ChannelId),
    NoDownloadInProgress,
    DownloadInProgress,
    GameStateTooLarge {
        octet_count: usize,
        max: usize,
    },
    StepStoreError(StepStoreError),
    OutStreamError(OutStreamError),
    IoError(io::Error),
}

impl ErrorLevelProvider for ServerLogicError {
    fn error_level(&self) -> ErrorLevel {
        match self {
            Self::ConnectionCountExceedsLimit(_)
            | Self::ParticipantCountExceedsLimit(_)
            | Self::LocalPlayerCountExceedsLimit(_)
            | Self::StepOctetCountExceedsLimit(_)
            | Self::GameStateOctetCountExceedsLimit(_)
            | Self::DownloadInProgress
            | Self::GameStateTooLarge { .. }
            | Self::StepStoreError(_)
            | Self::IoError(_) => ErrorLevel::Critical,
            Self::ConnectionIndexOutOfRange { .. }
            | Self::AlreadyConnected(_)
            | Self::UnknownConnectionIndex(_)
            | Self::NoFreeParticipantConnectionSlot
            | Self::ParticipantConnectionReleased(_)
            | Self::UnknownParticipant(_)
            | Self::PredictedStepGap { .. }
            | Self::StepPayloadTooLarge { .. }
            | Self::BlobChannelStillActive(_) => ErrorLevel::Warning,
            Self::NeedJoinGameFirst | Self::NoDownloadInProgress => ErrorLevel::Info,
            Self::OutStreamError(err) => err.error_level(),
        }
    }
}

impl From<StepStoreError> for ServerLogicError {
    fn from(err: StepStoreError) -> Self {
        Self::StepStoreError(err)
    }
}

impl From<OutStreamError> for ServerLogicError {
    fn from(err: OutStreamError) -> Self {
        Self::OutStreamError(err)
    }
}

impl From<io::Error> for ServerLogicError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err)
    }
}
