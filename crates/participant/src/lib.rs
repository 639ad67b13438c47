/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/piot/lockstep-rust
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */

/*!
# lockstep-participant

`ParticipantId` names one logical player slot inside a game session. Live ids
are in the range `1..=max_participant_count`; the value `0` is reserved for
"empty slot" and never appears on the wire for a live participant.
*/

use flood_rs::{Deserialize, ReadOctetStream, Serialize, WriteOctetStream};
use std::fmt::Display;

#[derive(PartialEq, Eq, Copy, Ord, Hash, Clone, Debug, PartialOrd)]
pub struct ParticipantId(pub u8);

impl ParticipantId {
    pub const EMPTY: u8 = 0;

    #[must_use]
    pub const fn inner(self) -> u8 {
        self.0
    }
}

impl Serialize for ParticipantId {
    fn serialize(&self, stream: &mut impl WriteOctetStream) -> std::io::Result<()> {
        stream.write_u8(self.0)
    }
}

impl Deserialize for ParticipantId {
    fn deserialize(stream: &mut impl ReadOctetStream) -> std::io::Result<Self> {
        Ok(Self(stream.read_u8()?))
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Participant({})", self.0)
    }
}
