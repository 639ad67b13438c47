/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use crate::err::ServerLogicError;
use crate::game::Game;
use crate::participant_connection::ParticipantConnections;
use crate::FORCED_STEP_DISCONNECT_THRESHOLD;
use lockstep_participant::ParticipantId;
use lockstep_protocol::step::CombinedStep;
use log::{debug, trace};

/// Assembles authoritative steps from the heads of the per-connection step
/// rings. Keeps producing while at least one in-use connection can provide
/// the step for the next tick; the others get synthesized forced steps.
///
/// A connection that has been forced for too many ticks in a row is released
/// before the next tick is composed.
pub(crate) fn produce_authoritative_steps(
    game: &mut Game,
    connections: &mut ParticipantConnections,
) -> Result<usize, ServerLogicError> {
    let mut produced = 0;

    loop {
        if game.debug_is_frozen || game.authoritative_steps().is_full() {
            break;
        }

        let target = game.authoritative_steps().expected_write_id();
        let slots = connections.in_use_slots();
        if slots.is_empty() {
            break;
        }

        let someone_can_provide = slots.iter().any(|&slot| {
            connections
                .slot(slot)
                .is_some_and(|connection| connection.steps.get(target).is_some())
        });
        if !someone_can_provide {
            break;
        }

        let mut entries: Vec<(ParticipantId, Vec<u8>)> = Vec::new();
        let mut starved: Vec<usize> = Vec::new();

        for &slot in &slots {
            let Some(connection) = connections.get_mut(slot) else {
                continue;
            };
            connection.steps.discard_up_to(target);

            if connection.steps.front_step_id() == Some(target) {
                let info = connection.steps.pop().expect("front was checked");
                connection.forced_step_in_row_counter = 0;
                for participant_id in connection.participants.clone() {
                    let payload = info.step.0.get(&participant_id).cloned().unwrap_or_default();
                    entries.push((participant_id, payload));
                }
            } else {
                // The tick is composed without this connection, so its ring
                // must skip ahead: a later predicted step for this tick would
                // arrive too late to matter.
                if connection.steps.is_empty()
                    && target.next().delta(connection.steps.expected_write_id()) > 0
                {
                    connection.steps.reinit(target.next());
                }
                connection.forced_step_in_row_counter += 1;
                trace!(
                    "forcing step {} for connection {} (in row: {})",
                    target,
                    connection.id,
                    connection.forced_step_in_row_counter
                );
                for participant_id in &connection.participants {
                    entries.push((*participant_id, Vec::new()));
                }
                if connection.forced_step_in_row_counter > FORCED_STEP_DISCONNECT_THRESHOLD {
                    starved.push(slot);
                }
            }
        }

        let combined_step = CombinedStep::from_entries(entries)?;
        game.authoritative_steps_mut()
            .push_with_check(target, combined_step)?;
        produced += 1;

        for slot in starved {
            debug!("connection slot {slot} exceeded the forced-step threshold, releasing");
            connections.release_slot(slot, game);
        }
    }

    if produced > 0 {
        trace!("composed {produced} authoritative steps");
    }
    Ok(produced)
}
