/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::composer;
use crate::err::ServerLogicError;
use crate::game::Game;
use crate::participant_connection::ParticipantConnections;
use crate::{
    ServerConfig, AUTHORITATIVE_BUFFER_TARGET, BLOB_CHUNK_SIZE, BLOB_RESEND_MILLIS,
    MAX_GAME_STEP_RESPONSE_OCTETS,
};
use flood_rs::prelude::OutOctetStream;
use flood_rs::Serialize;
use lockstep_blob_stream::prelude::{ChannelId, OutLogicFront, ReceiverToSenderCommands};
use lockstep_protocol::prelude::*;
use lockstep_step_id::StepId;
use log::{debug, trace, warn};
use metricator::{AggregateMetric, MinMaxAvg};
use monotonic_time_rs::{Millis, MillisDuration};

#[derive(Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InitialStateDetermined,
    PendingReconnect,
}

/// Logic-level view of one transport connection: join state, download state
/// and the statistics the server keeps per client.
#[derive(Debug)]
pub struct Connection {
    pub(crate) phase: Phase,
    pub(crate) participant_connection: Option<usize>,
    pub(crate) blob_stream_out: Option<OutLogicFront>,
    blob_request_id: Option<u8>,
    next_blob_channel: u8,
    pub(crate) next_authoritative_step_id_to_send: StepId,
    steps_behind_stats: AggregateMetric<u16>,
    session_nonce: SessionNonce,
}

impl Connection {
    pub(crate) fn new(session_nonce: SessionNonce) -> Self {
        Self {
            phase: Phase::Idle,
            participant_connection: None,
            blob_stream_out: None,
            blob_request_id: None,
            next_blob_channel: 127,
            next_authoritative_step_id_to_send: StepId::new(0),
            steps_behind_stats: AggregateMetric::new(16).expect("threshold should be ok"),
            session_nonce,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub const fn session_nonce(&self) -> SessionNonce {
        self.session_nonce
    }

    #[must_use]
    pub const fn participant_connection(&self) -> Option<usize> {
        self.participant_connection
    }

    #[must_use]
    pub fn has_active_download(&self) -> bool {
        self.blob_stream_out.is_some()
    }

    #[must_use]
    pub const fn next_authoritative_step_id_to_send(&self) -> StepId {
        self.next_authoritative_step_id_to_send
    }

    /// How far behind the authoritative frontier this client's
    /// acknowledgements have been running.
    #[must_use]
    pub fn steps_behind(&self) -> Option<MinMaxAvg<u16>> {
        self.steps_behind_stats.values()
    }

    fn refusal_response(&self, client_request_id: ClientRequestId) -> ServerToClientCommands {
        ServerToClientCommands::JoinGame(JoinGameResponse {
            client_request_id,
            session_nonce: self.session_nonce,
            participants: Vec::new(),
        })
    }

    pub(crate) fn on_join(
        &mut self,
        config: &ServerConfig,
        game: &mut Game,
        connections: &mut ParticipantConnections,
        transport_connection_id: u8,
        request: &JoinGameRequest,
    ) -> Result<ServerToClientCommands, ServerLogicError> {
        debug!("on_join {request:?}");

        if let Some(slot) = self.participant_connection {
            if let Some(existing) = connections.get(slot) {
                // Same assignment is handed back, the first join wins.
                let participants = existing
                    .participants
                    .iter()
                    .map(|participant_id| JoinGameParticipant {
                        local_index: game
                            .participant(*participant_id)
                            .map_or(0, |participant| participant.local_index),
                        participant_id: *participant_id,
                    })
                    .collect();
                return Ok(ServerToClientCommands::JoinGame(JoinGameResponse {
                    client_request_id: request.client_request_id,
                    session_nonce: self.session_nonce,
                    participants,
                }));
            }
            // The slot was released underneath us (forced-step disconnect).
            self.participant_connection = None;
        }

        if request.local_indices.is_empty()
            || request.local_indices.len() > config.max_participant_count_for_each_connection
        {
            warn!(
                "join refused, invalid local player count {}",
                request.local_indices.len()
            );
            return Ok(self.refusal_response(request.client_request_id));
        }

        let Some(participant_ids) = game.allocate_participants(&request.local_indices) else {
            warn!("join refused, participant table is full");
            return Ok(self.refusal_response(request.client_request_id));
        };

        let start_step_id = game.authoritative_steps().expected_write_id();
        match connections.create(transport_connection_id, participant_ids.clone(), start_step_id) {
            Ok(slot) => {
                self.participant_connection = Some(slot);
                let participants = request
                    .local_indices
                    .iter()
                    .zip(&participant_ids)
                    .map(|(local_index, participant_id)| JoinGameParticipant {
                        local_index: *local_index,
                        participant_id: *participant_id,
                    })
                    .collect();
                Ok(ServerToClientCommands::JoinGame(JoinGameResponse {
                    client_request_id: request.client_request_id,
                    session_nonce: self.session_nonce,
                    participants,
                }))
            }
            Err(_) => {
                for participant_id in participant_ids {
                    game.free_participant(participant_id);
                }
                warn!("join refused, no free participant connection slot");
                Ok(self.refusal_response(request.client_request_id))
            }
        }
    }

    pub(crate) fn on_game_step(
        &mut self,
        config: &ServerConfig,
        game: &mut Game,
        connections: &mut ParticipantConnections,
        request: &GameStepRequest,
    ) -> Result<ServerToClientCommands, ServerLogicError> {
        trace!("on incoming predicted steps {request}");

        let slot = self
            .participant_connection
            .ok_or(ServerLogicError::NeedJoinGameFirst)?;

        let authoritative_len = game.authoritative_steps().len();
        if authoritative_len > AUTHORITATIVE_BUFFER_TARGET {
            let excess = authoritative_len - AUTHORITATIVE_BUFFER_TARGET;
            debug!("authoritative buffer over target, discarding {excess} oldest steps");
            game.authoritative_steps_mut().discard_count(excess);
        }

        {
            let connection = connections
                .get_mut(slot)
                .ok_or(ServerLogicError::ParticipantConnectionReleased(slot))?;

            let mut step_id = request.first_predicted_step_id;
            for combined_step in &request.predicted_steps {
                let expected = connection.steps.expected_write_id();
                if step_id.is_before(expected) {
                    // Already stored, the client resent it.
                    step_id += 1;
                    continue;
                }
                if step_id.delta(expected) > 0 {
                    return Err(ServerLogicError::PredictedStepGap {
                        expected,
                        encountered: step_id,
                    });
                }

                for (participant_id, payload) in &combined_step.0 {
                    if !connection.participants.contains(participant_id) {
                        return Err(ServerLogicError::UnknownParticipant(*participant_id));
                    }
                    if payload.len() > config.max_single_participant_step_octet_count {
                        return Err(ServerLogicError::StepPayloadTooLarge {
                            octet_count: payload.len(),
                            max: config.max_single_participant_step_octet_count,
                        });
                    }
                }

                if connection.steps.is_full() {
                    trace!("incoming step window is full, dropping the rest");
                    break;
                }
                connection.steps.push_with_check(step_id, combined_step.clone())?;
                step_id += 1;
            }

            let buffered = connection.steps.len();
            connection.incoming_step_count_stats.add(buffered as u16);
        }

        composer::produce_authoritative_steps(game, connections)?;

        let behind = game
            .authoritative_steps()
            .expected_write_id()
            .delta(request.waiting_for_step_id);
        if behind >= 0 {
            self.steps_behind_stats
                .add(behind.min(i32::from(u16::MAX)) as u16);
        }

        let authoritative = game.authoritative_steps();
        let start = request.waiting_for_step_id;
        let mut steps = Vec::new();
        if start.is_at_or_after(authoritative.expected_read_id()) {
            let mut budget = MAX_GAME_STEP_RESPONSE_OCTETS;
            for info in authoritative.range_iter(start, usize::from(u8::MAX)) {
                let mut probe = OutOctetStream::new();
                info.step.serialize(&mut probe)?;
                let octet_count = probe.octets_ref().len();
                if octet_count > budget {
                    break;
                }
                budget -= octet_count;
                steps.push(info.step.clone());
            }
        } else {
            debug!(
                "client waits for {start} which is behind the window, it must re-download state"
            );
        }

        let response = GameStepResponse {
            start_step_id: start,
            authoritative_steps: steps,
        };
        trace!("sending auth steps: {response}");
        Ok(ServerToClientCommands::GameStep(response))
    }

    pub(crate) fn on_download(
        &mut self,
        now: Millis,
        config: &ServerConfig,
        game: &Game,
        request: &DownloadGameStateRequest,
    ) -> Result<Vec<ServerToClientCommands>, ServerLogicError> {
        debug!("client requested download {request:?}");

        if request.application_version != config.required_application_version {
            warn!(
                "download refused, client has {} but server requires {}",
                request.application_version, config.required_application_version
            );
            return Ok(vec![ServerToClientCommands::DownloadGameState(
                DownloadGameStateResponse {
                    client_request_id: request.client_request_id,
                    result: DownloadGameStateResult::WrongApplicationVersion,
                },
            )]);
        }

        let state = game.latest_state();
        let is_same_request = self.blob_request_id == Some(request.client_request_id.0);
        if !is_same_request {
            let channel = ChannelId(self.next_blob_channel);
            if self
                .blob_stream_out
                .as_ref()
                .is_some_and(|stream| stream.channel() == channel)
            {
                return Err(ServerLogicError::BlobChannelStillActive(channel));
            }
            self.next_blob_channel = if self.next_blob_channel == 0 {
                127
            } else {
                self.next_blob_channel - 1
            };
            self.blob_stream_out = Some(OutLogicFront::new(
                channel,
                BLOB_CHUNK_SIZE,
                MillisDuration::from_millis(BLOB_RESEND_MILLIS),
                &state.octets,
            )?);
            self.blob_request_id = Some(request.client_request_id.0);
            self.phase = Phase::InitialStateDetermined;
            self.next_authoritative_step_id_to_send = state.step_id.next();
        }

        let stream = self
            .blob_stream_out
            .as_mut()
            .ok_or(ServerLogicError::NoDownloadInProgress)?;

        let mut commands = vec![ServerToClientCommands::DownloadGameState(
            DownloadGameStateResponse {
                client_request_id: request.client_request_id,
                result: DownloadGameStateResult::Begin {
                    blob_channel: stream.channel(),
                    total_octet_count: stream.octet_size(),
                    step_id: state.step_id,
                },
            },
        )];

        // Datagram drop rates are usually low, so the transfer announcement
        // goes out together with the response instead of waiting a tick.
        commands.extend(
            stream
                .send(now)
                .into_iter()
                .map(ServerToClientCommands::GameStatePart),
        );

        Ok(commands)
    }

    pub(crate) fn on_download_status(
        &mut self,
        now: Millis,
        status: &ReceiverToSenderCommands,
    ) -> Result<Vec<ServerToClientCommands>, ServerLogicError> {
        let stream = self
            .blob_stream_out
            .as_mut()
            .ok_or(ServerLogicError::NoDownloadInProgress)?;

        stream.receive(status)?;
        let parts: Vec<_> = stream
            .send(now)
            .into_iter()
            .map(ServerToClientCommands::GameStatePart)
            .collect();

        if stream.is_received_by_remote() {
            debug!("blob stream {} fully received, releasing", stream.channel());
            self.blob_stream_out = None;
        }

        Ok(parts)
    }
}
