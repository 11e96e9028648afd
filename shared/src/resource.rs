//! Fixed-size binary records for the entities clients push to the relay.
//!
//! Each resource kind has a static type tag and a fixed encoded length, and
//! the set of kinds is closed: decoding dispatches exhaustively on the tag
//! byte and anything outside the registry is a protocol error. Record
//! boundaries inside a packet are only recoverable because every length is
//! known up front, which is why an unknown tag poisons the whole datagram.

use crate::protocol::{read_f32, read_u32, WireError};

/// Type tag of a player record.
pub const PLAYER_TAG: u8 = 0;
/// Type tag of a projectile record.
pub const PROJECTILE_TAG: u8 = 1;

/// Encoded player record: tag + id + health + x/y/z.
pub const PLAYER_LEN: usize = 21;
/// Encoded projectile record: tag + id + x/y/z + velocity x/y/z.
pub const PROJECTILE_LEN: usize = 29;

/// A player's state. The id doubles as the owning client's identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u32,
    pub health: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub vel_z: f32,
}

/// One simulated entity's state at one instant.
///
/// Constructed transiently while decoding an inbound datagram or encoding
/// an outbound snapshot; never stored beyond the call that creates it.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Player(Player),
    Projectile(Projectile),
}

impl Resource {
    pub fn type_tag(&self) -> u8 {
        match self {
            Resource::Player(_) => PLAYER_TAG,
            Resource::Projectile(_) => PROJECTILE_TAG,
        }
    }

    /// Merge key: globally unique per entity across all clients.
    pub fn id(&self) -> u32 {
        match self {
            Resource::Player(p) => p.id,
            Resource::Projectile(p) => p.id,
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            Resource::Player(_) => PLAYER_LEN,
            Resource::Projectile(_) => PROJECTILE_LEN,
        }
    }

    /// Fixed record length for a type tag, or `None` for tags outside the
    /// closed registry.
    pub fn encoded_len_for_tag(tag: u8) -> Option<usize> {
        match tag {
            PLAYER_TAG => Some(PLAYER_LEN),
            PROJECTILE_TAG => Some(PROJECTILE_LEN),
            _ => None,
        }
    }

    /// Writes this record into `buf` at `offset` and returns the bytes
    /// written. Bounds are checked before any byte is written.
    pub fn encode_into(&self, buf: &mut [u8], offset: usize) -> Result<usize, WireError> {
        let len = self.encoded_len();
        if offset + len > buf.len() {
            return Err(WireError::CapacityExceeded {
                needed: offset + len,
                capacity: buf.len(),
            });
        }

        buf[offset] = self.type_tag();
        buf[offset + 1..offset + 5].copy_from_slice(&self.id().to_le_bytes());

        match self {
            Resource::Player(p) => {
                buf[offset + 5..offset + 9].copy_from_slice(&p.health.to_le_bytes());
                buf[offset + 9..offset + 13].copy_from_slice(&p.x.to_le_bytes());
                buf[offset + 13..offset + 17].copy_from_slice(&p.y.to_le_bytes());
                buf[offset + 17..offset + 21].copy_from_slice(&p.z.to_le_bytes());
            }
            Resource::Projectile(p) => {
                buf[offset + 5..offset + 9].copy_from_slice(&p.x.to_le_bytes());
                buf[offset + 9..offset + 13].copy_from_slice(&p.y.to_le_bytes());
                buf[offset + 13..offset + 17].copy_from_slice(&p.z.to_le_bytes());
                buf[offset + 17..offset + 21].copy_from_slice(&p.vel_x.to_le_bytes());
                buf[offset + 21..offset + 25].copy_from_slice(&p.vel_y.to_le_bytes());
                buf[offset + 25..offset + 29].copy_from_slice(&p.vel_z.to_le_bytes());
            }
        }

        Ok(len)
    }

    /// Decodes one record from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Resource, WireError> {
        let tag = *bytes.first().ok_or(WireError::Truncated {
            expected: 1,
            actual: 0,
        })?;
        let len = Resource::encoded_len_for_tag(tag)
            .ok_or(WireError::UnknownResourceType { tag, offset: 0 })?;
        if bytes.len() < len {
            return Err(WireError::Truncated {
                expected: len,
                actual: bytes.len(),
            });
        }

        let id = read_u32(bytes, 1);
        match tag {
            PLAYER_TAG => Ok(Resource::Player(Player {
                id,
                health: read_u32(bytes, 5),
                x: read_f32(bytes, 9),
                y: read_f32(bytes, 13),
                z: read_f32(bytes, 17),
            })),
            PROJECTILE_TAG => Ok(Resource::Projectile(Projectile {
                id,
                x: read_f32(bytes, 5),
                y: read_f32(bytes, 9),
                z: read_f32(bytes, 13),
                vel_x: read_f32(bytes, 17),
                vel_y: read_f32(bytes, 21),
                vel_z: read_f32(bytes, 25),
            })),
            _ => unreachable!("tag validated against the registry above"),
        }
    }
}
