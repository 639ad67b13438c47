/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
pub use crate::{
    client_to_server::{
        ClientToServerCommands, DownloadGameStateRequest, GameStepRequest, JoinGameRequest,
    },
    server_to_client::{
        DownloadGameStateResponse, DownloadGameStateResult, GameStepResponse, JoinGameParticipant,
        JoinGameResponse, ServerToClientCommands,
    },
    step::{CombinedStep, StepMap},
    ApplicationVersion, ClientRequestId, SessionNonce,
};
