/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::STATE_REPROVISION_DELTA;
use lockstep_participant::ParticipantId;
use lockstep_protocol::step::CombinedStep;
use lockstep_step_id::StepId;
use lockstep_steps::StepStore;

/// Serialized game state snapshot together with the tick it was captured at.
#[derive(Debug, Clone)]
pub struct GameState {
    pub step_id: StepId,
    pub octets: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct Participant {
    pub id: ParticipantId,
    pub local_index: u8,
}

/// Latest authoritative state blob, the authoritative step ring and the
/// participant registry.
#[derive(Debug)]
pub struct Game {
    authoritative_steps: StepStore<CombinedStep>,
    latest_state: GameState,
    participants: Vec<Option<Participant>>,
    pub debug_is_frozen: bool,
}

impl Game {
    #[must_use]
    pub fn new(step_id: StepId, max_participant_count: usize) -> Self {
        Self {
            authoritative_steps: StepStore::new(step_id),
            latest_state: GameState {
                step_id,
                octets: Vec::new(),
            },
            // Slot 0 is never handed out; participant id 0 means "empty".
            participants: (0..=max_participant_count).map(|_| None).collect(),
            debug_is_frozen: false,
        }
    }

    #[must_use]
    pub const fn authoritative_steps(&self) -> &StepStore<CombinedStep> {
        &self.authoritative_steps
    }

    pub(crate) fn authoritative_steps_mut(&mut self) -> &mut StepStore<CombinedStep> {
        &mut self.authoritative_steps
    }

    #[must_use]
    pub const fn latest_state(&self) -> &GameState {
        &self.latest_state
    }

    pub(crate) fn set_state(&mut self, octets: &[u8], step_id: StepId) {
        self.latest_state = GameState {
            step_id,
            octets: octets.to_vec(),
        };
    }

    /// True when the authoritative frontier has run so far ahead of the stored
    /// snapshot that a joiner could no longer catch up from steps alone.
    #[must_use]
    pub fn must_provide_state(&self) -> bool {
        self.authoritative_steps
            .expected_write_id()
            .delta(self.latest_state.step_id)
            > STATE_REPROVISION_DELTA
    }

    pub(crate) fn reinit(&mut self, octets: &[u8], step_id: StepId) {
        self.authoritative_steps.reinit(step_id);
        self.set_state(octets, step_id);
    }

    /// Allocates one participant per requested local index, all or nothing.
    /// Returned ids are in the same order as `local_indices`.
    pub(crate) fn allocate_participants(
        &mut self,
        local_indices: &[u8],
    ) -> Option<Vec<ParticipantId>> {
        let free_count = self.participants[1..]
            .iter()
            .filter(|slot| slot.is_none())
            .count();
        if free_count < local_indices.len() {
            return None;
        }

        let mut allocated = Vec::with_capacity(local_indices.len());
        for local_index in local_indices {
            let slot_index = self.participants[1..]
                .iter()
                .position(Option::is_none)
                .expect("free count was checked")
                + 1;
            let id = ParticipantId(slot_index as u8);
            self.participants[slot_index] = Some(Participant {
                id,
                local_index: *local_index,
            });
            allocated.push(id);
        }
        Some(allocated)
    }

    pub(crate) fn free_participant(&mut self, id: ParticipantId) {
        if let Some(slot) = self.participants.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id.0 as usize)?.as_ref()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants[1..]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    #[must_use]
    pub fn max_participant_count(&self) -> usize {
        self.participants.len() - 1
    }
}
