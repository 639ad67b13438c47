/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_blob_stream::prelude::{ChannelId, ReceiverToSenderCommands, SenderToReceiverCommands};
use lockstep_participant::ParticipantId;
use lockstep_protocol::prelude::*;
use lockstep_server_logic::err::ServerLogicError;
use lockstep_server_logic::connection::Phase;
use lockstep_server_logic::participant_connection::PARTICIPANT_CONNECTION_RELEASED_ID;
use lockstep_server_logic::{ServerConfig, ServerLogic, AUTHORITATIVE_BUFFER_TARGET};
use lockstep_step_id::StepId;
use monotonic_time_rs::Millis;

fn test_config() -> ServerConfig {
    ServerConfig {
        max_connection_count: 4,
        max_participant_count: 4,
        max_participant_count_for_each_connection: 4,
        max_single_participant_step_octet_count: 4,
        max_game_state_octet_count: 0xFFFF,
        required_application_version: ApplicationVersion(1),
    }
}

fn join(logic: &mut ServerLogic, connection_index: u8, local_indices: Vec<u8>) -> JoinGameResponse {
    let commands = logic
        .update(
            connection_index,
            Millis::new(0),
            &ClientToServerCommands::JoinGame(JoinGameRequest {
                client_request_id: ClientRequestId(1),
                local_indices,
            }),
        )
        .expect("join should be answered");
    assert_eq!(commands.len(), 1);
    match &commands[0] {
        ServerToClientCommands::JoinGame(response) => response.clone(),
        other => panic!("expected a join response, got {other}"),
    }
}

fn single_step(participant_id: u8, octet: u8) -> CombinedStep {
    CombinedStep::from_entries(vec![(ParticipantId(participant_id), vec![octet])]).unwrap()
}

fn feed_steps(
    logic: &mut ServerLogic,
    connection_index: u8,
    first: StepId,
    steps: Vec<CombinedStep>,
) -> GameStepResponse {
    let waiting = logic.game().authoritative_steps().expected_write_id();
    let commands = logic
        .update(
            connection_index,
            Millis::new(0),
            &ClientToServerCommands::GameStep(GameStepRequest {
                waiting_for_step_id: waiting,
                first_predicted_step_id: first,
                predicted_steps: steps,
            }),
        )
        .expect("game step should be answered");
    match &commands[0] {
        ServerToClientCommands::GameStep(response) => response.clone(),
        other => panic!("expected a game step response, got {other}"),
    }
}

#[test_log::test]
fn join_assigns_first_participant_id() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0x100)).unwrap();
    logic.create_connection(0).unwrap();

    let response = join(&mut logic, 0, vec![0]);
    assert_eq!(response.participants.len(), 1);
    assert_eq!(response.participants[0].participant_id, ParticipantId(1));
    assert_eq!(response.participants[0].local_index, 0);
}

#[test_log::test]
fn second_join_returns_same_assignment() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.create_connection(0).unwrap();

    let first = join(&mut logic, 0, vec![0, 1]);
    let second = join(&mut logic, 0, vec![0, 1]);
    assert_eq!(first.participants, second.participants);
    assert_eq!(first.session_nonce, second.session_nonce);
    assert_eq!(logic.game().participant_count(), 2);
}

#[test_log::test]
fn join_is_refused_when_participant_table_is_full() {
    let mut config = test_config();
    config.max_participant_count = 2;
    let mut logic = ServerLogic::new(config).unwrap();
    logic.create_connection(0).unwrap();
    logic.create_connection(1).unwrap();

    let accepted = join(&mut logic, 0, vec![0, 1]);
    assert_eq!(accepted.participants.len(), 2);

    let refused = join(&mut logic, 1, vec![0]);
    assert!(refused.participants.is_empty());
    assert_eq!(logic.game().participant_count(), 2);
    assert_eq!(logic.participant_connections().in_use_count(), 1);
}

#[test_log::test]
fn game_step_before_join_is_an_error() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.create_connection(0).unwrap();

    let result = logic.update(
        0,
        Millis::new(0),
        &ClientToServerCommands::GameStep(GameStepRequest {
            waiting_for_step_id: StepId::new(0),
            first_predicted_step_id: StepId::new(0),
            predicted_steps: vec![],
        }),
    );
    assert!(matches!(result, Err(ServerLogicError::NeedJoinGameFirst)));
}

#[test_log::test]
fn predicted_steps_become_authoritative() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0x100)).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    let response = feed_steps(
        &mut logic,
        0,
        StepId::new(0x100),
        vec![single_step(1, 0xAA), single_step(1, 0xBB), single_step(1, 0xCC)],
    );

    assert_eq!(
        logic.game().authoritative_steps().expected_write_id(),
        StepId::new(0x103)
    );
    assert_eq!(response.start_step_id, StepId::new(0x100));
    assert_eq!(response.authoritative_steps.len(), 3);
    let payloads: Vec<_> = response
        .authoritative_steps
        .iter()
        .map(|step| step.0.get(&ParticipantId(1)).unwrap().clone())
        .collect();
    assert_eq!(payloads, vec![vec![0xAA], vec![0xBB], vec![0xCC]]);
}

#[test_log::test]
fn resent_predicted_steps_are_skipped() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0)).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    feed_steps(
        &mut logic,
        0,
        StepId::new(0),
        vec![single_step(1, 0x01), single_step(1, 0x02)],
    );
    // The client did not see the reply and resends both steps plus a new one.
    feed_steps(
        &mut logic,
        0,
        StepId::new(0),
        vec![single_step(1, 0x01), single_step(1, 0x02), single_step(1, 0x03)],
    );

    assert_eq!(
        logic.game().authoritative_steps().expected_write_id(),
        StepId::new(3)
    );
    let third = logic
        .game()
        .authoritative_steps()
        .get(StepId::new(2))
        .unwrap();
    assert_eq!(third.0.get(&ParticipantId(1)).unwrap(), &vec![0x03]);
}

#[test_log::test]
fn predicted_step_gap_is_refused() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0)).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    let result = logic.update(
        0,
        Millis::new(0),
        &ClientToServerCommands::GameStep(GameStepRequest {
            waiting_for_step_id: StepId::new(0),
            first_predicted_step_id: StepId::new(5),
            predicted_steps: vec![single_step(1, 0x01)],
        }),
    );
    assert!(matches!(
        result,
        Err(ServerLogicError::PredictedStepGap { .. })
    ));
    assert_eq!(
        logic.game().authoritative_steps().expected_write_id(),
        StepId::new(0)
    );
}

#[test_log::test]
fn oversized_step_payload_is_refused() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    let oversized =
        CombinedStep::from_entries(vec![(ParticipantId(1), vec![0u8; 5])]).unwrap();
    let result = logic.update(
        0,
        Millis::new(0),
        &ClientToServerCommands::GameStep(GameStepRequest {
            waiting_for_step_id: StepId::new(0),
            first_predicted_step_id: StepId::new(0),
            predicted_steps: vec![oversized],
        }),
    );
    assert!(matches!(
        result,
        Err(ServerLogicError::StepPayloadTooLarge { octet_count: 5, max: 4 })
    ));
}

#[test_log::test]
fn silent_connection_is_released_after_forced_step_threshold() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0x100)).unwrap();
    logic.create_connection(0).unwrap();
    logic.create_connection(1).unwrap();
    join(&mut logic, 0, vec![0]);
    join(&mut logic, 1, vec![0]);

    // Connection 0 keeps sending; connection 1 stays silent for 61 composed
    // ticks, which puts it over the threshold.
    let steps: Vec<_> = (0..61).map(|i| single_step(1, i as u8)).collect();
    feed_steps(&mut logic, 0, StepId::new(0x100), steps);

    let silent = logic.participant_connections().slot(1).unwrap();
    assert!(!silent.is_used);
    assert_eq!(silent.id, PARTICIPANT_CONNECTION_RELEASED_ID);
    assert_eq!(logic.game().participant_count(), 1);

    // Composing keeps going with the remaining connection only.
    feed_steps(&mut logic, 0, StepId::new(0x13D), vec![single_step(1, 0xFF)]);
    let write_id = logic.game().authoritative_steps().expected_write_id();
    assert_eq!(write_id, StepId::new(0x13E));
    let last = logic
        .game()
        .authoritative_steps()
        .get(StepId::new(0x13D))
        .unwrap();
    assert_eq!(last.participant_count(), 1);
    assert!(last.0.get(&ParticipantId(1)).is_some());
}

#[test_log::test]
fn authoritative_overflow_is_discarded_from_the_oldest_end() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0x100)).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    let count = AUTHORITATIVE_BUFFER_TARGET + 5;
    let steps: Vec<_> = (0..count).map(|i| single_step(1, i as u8)).collect();
    feed_steps(&mut logic, 0, StepId::new(0x100), steps);
    assert_eq!(logic.game().authoritative_steps().len(), count);

    // The next request discards the overflow before reading input.
    feed_steps(
        &mut logic,
        0,
        StepId::new(0x100 + count as u32),
        vec![],
    );
    assert_eq!(
        logic.game().authoritative_steps().len(),
        AUTHORITATIVE_BUFFER_TARGET
    );
    assert_eq!(
        logic.game().authoritative_steps().expected_read_id(),
        StepId::new(0x105)
    );
}

#[test_log::test]
fn snapshot_is_requested_after_the_frontier_runs_ahead() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0x100)).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);

    // 80 ticks ahead is still fine, 81 trips the threshold. The incoming
    // window holds 64 steps, so the ticks arrive in two batches.
    let first_batch: Vec<_> = (0..40).map(|i| single_step(1, i as u8)).collect();
    feed_steps(&mut logic, 0, StepId::new(0x100), first_batch);
    let second_batch: Vec<_> = (40..80).map(|i| single_step(1, i as u8)).collect();
    feed_steps(&mut logic, 0, StepId::new(0x128), second_batch);
    assert!(!logic.must_provide_game_state());

    feed_steps(&mut logic, 0, StepId::new(0x150), vec![single_step(1, 0xFF)]);
    assert!(logic.must_provide_game_state());

    logic
        .set_game_state(&[0xFE, 0xFE], StepId::new(0x151))
        .unwrap();
    assert!(!logic.must_provide_game_state());
}

#[test_log::test]
fn download_and_blob_transfer_runs_to_completion() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic
        .reinit_with_game(&[0x10, 0x20, 0x30], StepId::new(0x200))
        .unwrap();
    logic.create_connection(0).unwrap();
    let now = Millis::new(0);

    let commands = logic
        .update(
            0,
            now,
            &ClientToServerCommands::DownloadGameState(DownloadGameStateRequest {
                client_request_id: ClientRequestId(0x42),
                application_version: ApplicationVersion(1),
            }),
        )
        .unwrap();
    assert_eq!(commands.len(), 2);

    let ServerToClientCommands::DownloadGameState(response) = &commands[0] else {
        panic!("expected a download response");
    };
    assert_eq!(response.client_request_id, ClientRequestId(0x42));
    let DownloadGameStateResult::Begin {
        blob_channel,
        total_octet_count,
        step_id,
    } = &response.result
    else {
        panic!("expected the download to begin");
    };
    assert_eq!(*blob_channel, ChannelId(127));
    assert_eq!(*total_octet_count, 3);
    assert_eq!(*step_id, StepId::new(0x200));

    let connection = logic.connection(0).unwrap();
    assert_eq!(*connection.phase(), Phase::InitialStateDetermined);
    assert_eq!(
        connection.next_authoritative_step_id_to_send(),
        StepId::new(0x201)
    );

    // Drive the client side of the blob stream until the server releases it.
    let mut client = lockstep_blob_stream::prelude::InLogicFront::new();
    let ServerToClientCommands::GameStatePart(announcement) = &commands[1] else {
        panic!("expected the transfer announcement");
    };
    client.receive(announcement).unwrap();

    let mut pending: Vec<ReceiverToSenderCommands> = vec![client.send().unwrap()];
    for _ in 0..8 {
        let Some(status) = pending.pop() else { break };
        let parts = logic
            .update(0, now, &ClientToServerCommands::DownloadGameStateStatus(status))
            .unwrap();
        for part in &parts {
            let ServerToClientCommands::GameStatePart(chunk) = part else {
                panic!("expected a game state part");
            };
            let SenderToReceiverCommands::SetChunk(_) = chunk else {
                panic!("expected chunks after the announcement was acked");
            };
            client.receive(chunk).unwrap();
        }
        if !logic.connection(0).unwrap().has_active_download() {
            break;
        }
        pending.push(client.send().unwrap());
    }

    assert_eq!(client.blob().unwrap(), &[0x10, 0x20, 0x30]);
    assert!(!logic.connection(0).unwrap().has_active_download());
}

#[test_log::test]
fn download_with_wrong_version_is_refused() {
    let mut config = test_config();
    config.required_application_version = ApplicationVersion(7);
    let mut logic = ServerLogic::new(config).unwrap();
    logic.create_connection(0).unwrap();

    let commands = logic
        .update(
            0,
            Millis::new(0),
            &ClientToServerCommands::DownloadGameState(DownloadGameStateRequest {
                client_request_id: ClientRequestId(3),
                application_version: ApplicationVersion(6),
            }),
        )
        .unwrap();
    assert_eq!(commands.len(), 1);
    let ServerToClientCommands::DownloadGameState(response) = &commands[0] else {
        panic!("expected a download response");
    };
    assert_eq!(
        response.result,
        DownloadGameStateResult::WrongApplicationVersion
    );

    let connection = logic.connection(0).unwrap();
    assert_eq!(*connection.phase(), Phase::Idle);
    assert!(!connection.has_active_download());
}

#[test_log::test]
fn reinit_restarts_state_and_authoritative_ring() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.create_connection(0).unwrap();
    join(&mut logic, 0, vec![0]);
    feed_steps(&mut logic, 0, StepId::new(0), vec![single_step(1, 0x01)]);

    logic.reinit_with_game(&[0x77], StepId::new(0x1000)).unwrap();

    assert_eq!(logic.game().latest_state().step_id, StepId::new(0x1000));
    assert_eq!(
        logic.game().authoritative_steps().expected_read_id(),
        StepId::new(0x1000)
    );
    assert!(logic.game().authoritative_steps().is_empty());
    // The session restarted, so every participant connection is gone.
    assert_eq!(logic.participant_connections().in_use_count(), 0);
    assert_eq!(logic.game().participant_count(), 0);
}

#[test_log::test]
fn reinit_is_refused_while_a_download_is_streaming() {
    let mut logic = ServerLogic::new(test_config()).unwrap();
    logic.reinit_with_game(&[0x00], StepId::new(0)).unwrap();
    logic.create_connection(0).unwrap();

    logic
        .update(
            0,
            Millis::new(0),
            &ClientToServerCommands::DownloadGameState(DownloadGameStateRequest {
                client_request_id: ClientRequestId(1),
                application_version: ApplicationVersion(1),
            }),
        )
        .unwrap();

    let result = logic.reinit_with_game(&[0x01], StepId::new(5));
    assert!(matches!(result, Err(ServerLogicError::DownloadInProgress)));
    assert_eq!(logic.game().latest_state().step_id, StepId::new(0));
}

#[test_log::test]
fn init_refuses_limits_over_the_hard_caps() {
    let mut config = test_config();
    config.max_single_participant_step_octet_count = 25;
    assert!(matches!(
        ServerLogic::new(config),
        Err(ServerLogicError::StepOctetCountExceedsLimit(25))
    ));

    let mut config = test_config();
    config.max_connection_count = 65;
    assert!(matches!(
        ServerLogic::new(config),
        Err(ServerLogicError::ConnectionCountExceedsLimit(65))
    ));

    let mut config = test_config();
    config.max_participant_count_for_each_connection = 9;
    assert!(matches!(
        ServerLogic::new(config),
        Err(ServerLogicError::LocalPlayerCountExceedsLimit(9))
    ));
}
