/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-server-logic

Authoritative core of the lockstep server: the game (authoritative step ring,
latest state snapshot, participant registry), the participant connection pool,
the step composer and the request handlers. The transport pump in
`lockstep-server` feeds decoded commands into [`ServerLogic::update`] and
ships the returned commands back to the client.
*/

mod composer;
pub mod connection;
pub mod err;
pub mod game;
pub mod participant_connection;

use crate::connection::{Connection, Phase};
use crate::err::ServerLogicError;
use crate::game::Game;
use crate::participant_connection::ParticipantConnections;
use lockstep_protocol::prelude::*;
use lockstep_step_id::StepId;
use lockstep_steps::STEP_WINDOW_SIZE;
use monotonic_time_rs::Millis;

pub const MAX_CONNECTION_COUNT: usize = 64;
pub const MAX_LOCAL_PLAYERS: usize = 8;
pub const MAX_SINGLE_PARTICIPANT_STEP_OCTET_COUNT: usize = 24;
pub const MAX_GAME_STATE_OCTET_COUNT: usize = 0xFFFF;

/// Consecutive forced steps a connection survives before the server releases
/// it.
pub const FORCED_STEP_DISCONNECT_THRESHOLD: u32 = 60;

/// How far the authoritative frontier may run ahead of the stored snapshot
/// before the host is asked for a fresh one. Larger than the step window so a
/// joiner that can still catch up from steps does not trigger serialization,
/// with some hysteresis on top.
pub const STATE_REPROVISION_DELTA: i32 = 80;

/// Authoritative steps kept around for laggards; the excess is discarded from
/// the oldest end before new input is read.
pub const AUTHORITATIVE_BUFFER_TARGET: usize = STEP_WINDOW_SIZE / 3;

pub(crate) const BLOB_CHUNK_SIZE: u16 = 1024;
pub(crate) const BLOB_RESEND_MILLIS: u64 = 96;

/// Room left for authoritative steps in a game step response, after datagram
/// and command headers.
pub(crate) const MAX_GAME_STEP_RESPONSE_OCTETS: usize = 1100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_connection_count: usize,
    pub max_participant_count: usize,
    pub max_participant_count_for_each_connection: usize,
    pub max_single_participant_step_octet_count: usize,
    pub max_game_state_octet_count: usize,
    pub required_application_version: ApplicationVersion,
}

pub struct ServerLogic {
    config: ServerConfig,
    connections: Vec<Option<Connection>>,
    participant_connections: ParticipantConnections,
    game: Game,
    session_nonce_counter: u64,
}

impl ServerLogic {
    /// # Errors
    ///
    /// `ServerLogicError` when a configured limit exceeds its hard cap.
    pub fn new(config: ServerConfig) -> Result<Self, ServerLogicError> {
        if config.max_connection_count > MAX_CONNECTION_COUNT {
            return Err(ServerLogicError::ConnectionCountExceedsLimit(
                config.max_connection_count,
            ));
        }
        if config.max_participant_count > u8::MAX as usize {
            return Err(ServerLogicError::ParticipantCountExceedsLimit(
                config.max_participant_count,
            ));
        }
        if config.max_participant_count_for_each_connection > MAX_LOCAL_PLAYERS {
            return Err(ServerLogicError::LocalPlayerCountExceedsLimit(
                config.max_participant_count_for_each_connection,
            ));
        }
        if config.max_single_participant_step_octet_count > MAX_SINGLE_PARTICIPANT_STEP_OCTET_COUNT
        {
            return Err(ServerLogicError::StepOctetCountExceedsLimit(
                config.max_single_participant_step_octet_count,
            ));
        }
        if config.max_game_state_octet_count > MAX_GAME_STATE_OCTET_COUNT {
            return Err(ServerLogicError::GameStateOctetCountExceedsLimit(
                config.max_game_state_octet_count,
            ));
        }

        Ok(Self {
            connections: (0..config.max_connection_count).map(|_| None).collect(),
            participant_connections: ParticipantConnections::new(config.max_connection_count),
            game: Game::new(StepId::new(0), config.max_participant_count),
            session_nonce_counter: 0,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Kept for API compatibility with the original host interface; the real
    /// reset path is [`Self::reinit_with_game`].
    pub fn reset(&mut self) {}

    /// Restarts the session at `step_id` with a fresh state snapshot. Every
    /// participant connection is released and clients have to join again.
    ///
    /// # Errors
    ///
    /// Fails while any state download is still streaming: the snapshot being
    /// streamed must stay valid until the last acknowledgement.
    pub fn reinit_with_game(
        &mut self,
        octets: &[u8],
        step_id: StepId,
    ) -> Result<(), ServerLogicError> {
        if octets.len() > self.config.max_game_state_octet_count {
            return Err(ServerLogicError::GameStateTooLarge {
                octet_count: octets.len(),
                max: self.config.max_game_state_octet_count,
            });
        }
        if self
            .connections
            .iter()
            .flatten()
            .any(Connection::has_active_download)
        {
            return Err(ServerLogicError::DownloadInProgress);
        }

        self.game.reinit(octets, step_id);
        self.participant_connections.reset_all();
        for connection in self.connections.iter_mut().flatten() {
            connection.participant_connection = None;
            connection.phase = Phase::Idle;
            connection.next_authoritative_step_id_to_send = step_id;
        }
        Ok(())
    }

    /// Stores a freshly serialized state snapshot. The host is expected to
    /// call this whenever [`Self::must_provide_game_state`] reports true.
    ///
    /// # Errors
    ///
    /// `ServerLogicError::GameStateTooLarge` when the snapshot exceeds the
    /// configured limit.
    pub fn set_game_state(&mut self, octets: &[u8], step_id: StepId) -> Result<(), ServerLogicError> {
        if octets.len() > self.config.max_game_state_octet_count {
            return Err(ServerLogicError::GameStateTooLarge {
                octet_count: octets.len(),
                max: self.config.max_game_state_octet_count,
            });
        }
        self.game.set_state(octets, step_id);
        Ok(())
    }

    #[must_use]
    pub fn must_provide_game_state(&self) -> bool {
        self.game.must_provide_state()
    }

    #[must_use]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    #[must_use]
    pub const fn participant_connections(&self) -> &ParticipantConnections {
        &self.participant_connections
    }

    /// Registers a transport-level connection.
    ///
    /// # Errors
    ///
    /// `ServerLogicError` when the index is outside the configured range or
    /// already in use.
    pub fn create_connection(&mut self, connection_index: u8) -> Result<(), ServerLogicError> {
        let index = connection_index as usize;
        if index >= self.connections.len() {
            return Err(ServerLogicError::ConnectionIndexOutOfRange {
                index: connection_index,
                max: self.connections.len(),
            });
        }
        if self.connections[index].is_some() {
            return Err(ServerLogicError::AlreadyConnected(connection_index));
        }

        self.session_nonce_counter += 1;
        self.connections[index] = Some(Connection::new(SessionNonce(self.session_nonce_counter)));
        Ok(())
    }

    /// Tears down a transport-level connection together with its participant
    /// connection and participants.
    ///
    /// # Errors
    ///
    /// `ServerLogicError::UnknownConnectionIndex` when no such connection
    /// exists.
    pub fn destroy_connection(&mut self, connection_index: u8) -> Result<(), ServerLogicError> {
        let index = connection_index as usize;
        let connection = self
            .connections
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(ServerLogicError::UnknownConnectionIndex(connection_index))?;

        if let Some(slot) = connection.participant_connection {
            self.participant_connections
                .release_slot(slot, &mut self.game);
        }
        Ok(())
    }

    #[must_use]
    pub fn connection(&self, connection_index: u8) -> Option<&Connection> {
        self.connections.get(connection_index as usize)?.as_ref()
    }

    /// Handles one decoded client command and returns the commands to send
    /// back. A failing request leaves the logic consistent; the caller keeps
    /// pumping.
    ///
    /// # Errors
    ///
    /// `ServerLogicError` with an error level telling the caller whether a
    /// misbehaving client or an internal bug is the cause.
    pub fn update(
        &mut self,
        connection_index: u8,
        now: Millis,
        request: &ClientToServerCommands,
    ) -> Result<Vec<ServerToClientCommands>, ServerLogicError> {
        let index = connection_index as usize;
        let connection = self
            .connections
            .get_mut(index)
            .ok_or(ServerLogicError::ConnectionIndexOutOfRange {
                index: connection_index,
                max: self.config.max_connection_count,
            })?
            .as_mut()
            .ok_or(ServerLogicError::UnknownConnectionIndex(connection_index))?;

        match request {
            ClientToServerCommands::JoinGame(join_request) => Ok(vec![connection.on_join(
                &self.config,
                &mut self.game,
                &mut self.participant_connections,
                connection_index,
                join_request,
            )?]),
            ClientToServerCommands::GameStep(step_request) => Ok(vec![connection.on_game_step(
                &self.config,
                &mut self.game,
                &mut self.participant_connections,
                step_request,
            )?]),
            ClientToServerCommands::DownloadGameState(download_request) => {
                connection.on_download(now, &self.config, &self.game, download_request)
            }
            ClientToServerCommands::DownloadGameStateStatus(status) => {
                connection.on_download_status(now, status)
            }
        }
    }
}
