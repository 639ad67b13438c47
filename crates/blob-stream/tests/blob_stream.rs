/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use lockstep_blob_stream::prelude::*;
use monotonic_time_rs::{Millis, MillisDuration};

const CHUNK_SIZE: u16 = 4;

fn resend_duration() -> MillisDuration {
    MillisDuration::from_millis(96)
}

#[test_log::test]
fn full_transfer_round_trip() {
    let blob: Vec<u8> = (0u8..=10).collect();
    let mut now = Millis::new(0);

    let mut sender = OutLogicFront::new(ChannelId(127), CHUNK_SIZE, resend_duration(), &blob).unwrap();
    let mut receiver = InLogicFront::new();

    // The announcement must be acked before any chunk flows.
    let announcements = sender.send(now);
    assert_eq!(announcements.len(), 1);
    assert!(matches!(
        announcements[0],
        SenderToReceiverCommands::StartTransfer(ref start) if start.total_octet_size == 11
    ));

    for _ in 0..8 {
        for command in sender.send(now) {
            receiver.receive(&command).unwrap();
        }
        if let Some(ack) = receiver.send() {
            sender.receive(&ack).unwrap();
        }
        if sender.is_received_by_remote() {
            break;
        }
        now += MillisDuration::from_millis(32);
    }

    assert!(sender.is_received_by_remote());
    assert_eq!(receiver.blob().unwrap(), &blob[..]);
}

#[test_log::test]
fn chunks_are_resent_until_acked() {
    let blob = [0xAAu8; 8];
    let mut now = Millis::new(0);

    let mut logic = OutLogic::new(ChannelId(5), CHUNK_SIZE, resend_duration(), &blob).unwrap();

    let first = logic.send(now, 10);
    assert_eq!(first.len(), 2);

    // Nothing is due before the resend interval expires.
    now += MillisDuration::from_millis(10);
    assert!(logic.send(now, 10).is_empty());

    now += MillisDuration::from_millis(100);
    let resent = logic.send(now, 10);
    assert_eq!(resent.len(), 2);

    logic.set_waiting_for_chunk_index(2, 0).unwrap();
    assert!(logic.is_received_by_remote());
    now += MillisDuration::from_millis(100);
    assert!(logic.send(now, 10).is_empty());
}

#[test_log::test]
fn receive_mask_acks_chunks_after_gap() {
    let blob = [0x11u8; 20]; // five chunks
    let now = Millis::new(0);

    let mut logic = OutLogic::new(ChannelId(9), CHUNK_SIZE, resend_duration(), &blob).unwrap();
    logic.send(now, 10);

    // Receiver has chunk 0, is missing chunk 1, and already has 2 and 4.
    logic.set_waiting_for_chunk_index(1, 0b101).unwrap();
    assert!(!logic.is_received_by_remote());

    let mut later = now;
    later += MillisDuration::from_millis(200);
    let resent = logic.send(later, 10);
    let indices: Vec<_> = resent.iter().map(|chunk| chunk.chunk_index).collect();
    assert_eq!(indices, vec![1, 3]);
}

#[test_log::test]
fn wrong_chunk_size_is_refused() {
    let mut logic = InLogic::new(ChannelId(3), 10, CHUNK_SIZE as usize);

    let result = logic.receive(&SetChunkData {
        channel: ChannelId(3),
        chunk_index: 0,
        payload: vec![0u8; 3],
    });
    assert!(matches!(result, Err(BlobError::UnexpectedChunkSize(4, 3, 0))));

    let result = logic.receive(&SetChunkData {
        channel: ChannelId(3),
        chunk_index: 9,
        payload: vec![0u8; 4],
    });
    assert!(matches!(result, Err(BlobError::InvalidChunkIndex(9, 3))));
}

#[test_log::test]
fn redundant_chunk_with_same_contents_is_accepted() {
    let mut logic = InLogic::new(ChannelId(3), 4, CHUNK_SIZE as usize);
    let chunk = SetChunkData {
        channel: ChannelId(3),
        chunk_index: 0,
        payload: vec![1, 2, 3, 4],
    };

    logic.receive(&chunk).unwrap();
    logic.receive(&chunk).unwrap();
    assert!(logic.is_complete());

    let differing = SetChunkData {
        channel: ChannelId(3),
        chunk_index: 0,
        payload: vec![9, 9, 9, 9],
    };
    assert!(matches!(
        logic.receive(&differing),
        Err(BlobError::RedundantContentDiffers(0))
    ));
}

#[test_log::test]
fn chunk_outside_transfer_is_an_error() {
    let mut receiver = InLogicFront::new();
    let result = receiver.receive(&SenderToReceiverCommands::SetChunk(SetChunkData {
        channel: ChannelId(1),
        chunk_index: 0,
        payload: vec![0u8; 4],
    }));
    assert!(matches!(result, Err(BlobError::NoActiveTransfer)));
}
