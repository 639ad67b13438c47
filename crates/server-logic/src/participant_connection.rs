/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::ServerLogicError;
use crate::game::Game;
use lockstep_participant::ParticipantId;
use lockstep_protocol::step::CombinedStep;
use lockstep_step_id::StepId;
use lockstep_steps::StepStore;
use log::debug;
use metricator::AggregateMetric;

/// Sentinel written into a released slot so stale references fault loudly
/// instead of silently aliasing a re-used slot.
pub const PARTICIPANT_CONNECTION_RELEASED_ID: u16 = 0x100;

/// One transport connection's bundle of participants, with its own ring of
/// incoming predicted steps.
#[derive(Debug)]
pub struct ParticipantConnection {
    pub id: u16,
    pub is_used: bool,
    pub transport_connection_id: u8,
    pub steps: StepStore<CombinedStep>,
    pub participants: Vec<ParticipantId>,
    /// Consecutive ticks the composer had to synthesize a step because this
    /// connection had nothing to offer.
    pub forced_step_in_row_counter: u32,
    pub incoming_step_count_stats: AggregateMetric<u16>,
}

impl ParticipantConnection {
    fn empty() -> Self {
        Self {
            id: PARTICIPANT_CONNECTION_RELEASED_ID,
            is_used: false,
            transport_connection_id: 0,
            steps: StepStore::new(StepId::new(0)),
            participants: Vec::new(),
            forced_step_in_row_counter: 0,
            incoming_step_count_stats: AggregateMetric::new(16).expect("threshold should be ok"),
        }
    }

    fn reinit(
        &mut self,
        slot: usize,
        transport_connection_id: u8,
        participants: Vec<ParticipantId>,
        start_step_id: StepId,
    ) {
        self.id = slot as u16;
        self.is_used = true;
        self.transport_connection_id = transport_connection_id;
        self.steps.reinit(start_step_id);
        self.participants = participants;
        self.forced_step_in_row_counter = 0;
    }

    pub(crate) fn release(&mut self) {
        self.is_used = false;
        self.id = PARTICIPANT_CONNECTION_RELEASED_ID;
        self.participants.clear();
        self.forced_step_in_row_counter = 0;
        self.steps.reinit(StepId::new(0));
    }
}

/// Preallocated pool of participant connection slots. Slot selection is a
/// first-free scan; capacity is fixed at init.
#[derive(Debug)]
pub struct ParticipantConnections {
    connections: Vec<ParticipantConnection>,
}

impl ParticipantConnections {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            connections: (0..capacity).map(|_| ParticipantConnection::empty()).collect(),
        }
    }

    /// # Errors
    ///
    /// `ServerLogicError::NoFreeParticipantConnectionSlot` when every slot is
    /// taken.
    pub(crate) fn create(
        &mut self,
        transport_connection_id: u8,
        participants: Vec<ParticipantId>,
        start_step_id: StepId,
    ) -> Result<usize, ServerLogicError> {
        let slot = self
            .connections
            .iter()
            .position(|connection| !connection.is_used)
            .ok_or(ServerLogicError::NoFreeParticipantConnectionSlot)?;
        self.connections[slot].reinit(slot, transport_connection_id, participants, start_step_id);
        Ok(slot)
    }

    /// Looks up an in-use slot. Released slots return `None`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&ParticipantConnection> {
        self.connections
            .get(slot)
            .filter(|connection| connection.is_used)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> Option<&mut ParticipantConnection> {
        self.connections
            .get_mut(slot)
            .filter(|connection| connection.is_used)
    }

    /// Raw slot access, released slots included. Intended for inspection.
    #[must_use]
    pub fn slot(&self, slot: usize) -> Option<&ParticipantConnection> {
        self.connections.get(slot)
    }

    #[must_use]
    pub fn find_by_transport_connection_id(
        &self,
        transport_connection_id: u8,
    ) -> Option<&ParticipantConnection> {
        self.connections.iter().find(|connection| {
            connection.is_used && connection.transport_connection_id == transport_connection_id
        })
    }

    /// Frees the slot's participants from the game and marks the slot
    /// released.
    pub(crate) fn release_slot(&mut self, slot: usize, game: &mut Game) {
        if let Some(connection) = self.connections.get_mut(slot) {
            if !connection.is_used {
                return;
            }
            debug!("releasing participant connection {}", connection.id);
            for participant_id in connection.participants.clone() {
                game.free_participant(participant_id);
            }
            connection.release();
        }
    }

    pub(crate) fn reset_all(&mut self) {
        for connection in &mut self.connections {
            if connection.is_used {
                connection.release();
            }
        }
    }

    pub(crate) fn in_use_slots(&self) -> Vec<usize> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, connection)| connection.is_used)
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn iter_in_use(&self) -> impl Iterator<Item = &ParticipantConnection> {
        self.connections
            .iter()
            .filter(|connection| connection.is_used)
    }

    #[must_use]
    pub fn in_use_count(&self) -> usize {
        self.iter_in_use().count()
    }
}
