/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use lockstep_participant::ParticipantId;
use seq_map::SeqMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::io::ErrorKind;

/// Per-participant step payloads for one tick, in ascending participant-id
/// order. Payloads are opaque to the server; an empty payload is a forced
/// step, which the application reads as "no new input".
pub type StepMap = SeqMap<ParticipantId, Vec<u8>>;

/// Steps of every participant of one connection (or of the whole session, for
/// authoritative steps) for a single tick.
///
/// Wire format: `combined_len: u16`, `participant_count: u8`, then per
/// participant `participant_id: u8`, `step_len: u8`, `step_octets`.
/// `combined_len` covers everything after itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedStep(pub StepMap);

impl CombinedStep {
    /// Builds a combined step from unordered entries, normalizing to
    /// ascending participant-id order.
    ///
    /// # Errors
    ///
    /// `io::Error` with `InvalidData` when a participant appears twice.
    pub fn from_entries(mut entries: Vec<(ParticipantId, Vec<u8>)>) -> io::Result<Self> {
        entries.sort_by_key(|(participant_id, _)| *participant_id);
        let mut map = StepMap::new();
        for (participant_id, payload) in entries {
            map.insert(participant_id, payload).map_err(|_| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("duplicate participant {participant_id}"),
                )
            })?;
        }
        Ok(Self(map))
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.0.len()
    }

    fn octet_size_after_length_field(&self) -> usize {
        let mut size = 1;
        for payload in self.0.values() {
            size += 2 + payload.len();
        }
        size
    }
}

impl Display for CombinedStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "combined-step participants:{}", self.0.len())
    }
}

impl Serialize for CombinedStep {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> io::Result<()> {
        let combined_len = self.octet_size_after_length_field();
        if u16::try_from(combined_len).is_err() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "combined step too large",
            ));
        }
        stream.write_u16(combined_len as u16)?;
        stream.write_u8(self.0.len() as u8)?;
        for (participant_id, payload) in &self.0 {
            participant_id.serialize(stream)?;
            stream.write_u8(payload.len() as u8)?;
            if !payload.is_empty() {
                stream.write(payload)?;
            }
        }
        Ok(())
    }
}

impl Deserialize for CombinedStep {
    fn deserialize(stream: &mut impl ReadOctetStream) -> io::Result<Self> {
        let combined_len = stream.read_u16()? as usize;
        let participant_count = stream.read_u8()?;
        let mut map = StepMap::new();
        let mut consumed = 1usize;
        for _ in 0..participant_count {
            let participant_id = ParticipantId::deserialize(stream)?;
            let step_len = stream.read_u8()? as usize;
            let mut payload = vec![0u8; step_len];
            if step_len > 0 {
                stream.read(&mut payload)?;
            }
            consumed += 2 + step_len;
            map.insert(participant_id, payload).map_err(|_| {
                io::Error::new(
                    ErrorKind::InvalidData,
                    format!("duplicate participant {participant_id}"),
                )
            })?;
        }

        if consumed != combined_len {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("combined step length mismatch: framed {combined_len}, read {consumed}"),
            ));
        }

        Ok(Self(map))
    }
}
