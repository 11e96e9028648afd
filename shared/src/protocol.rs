//! Packet framing for client updates and server broadcasts.
//!
//! Both directions share one layout, little-endian throughout:
//!
//! | offset | field          | type                          |
//! |--------|----------------|-------------------------------|
//! | 0      | op             | u8 (0 register, 1 update)     |
//! | 1-4    | sender id      | u32                           |
//! | 5-8    | payload length | u32, total incl. this header  |
//! | 9..    | records        | `[tag:u8][id:u32][fields...]` |
//!
//! The register message reuses the first nine bytes with a different
//! meaning: `[op=0][client_id:u32][listen_port:u32]`.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use crate::resource::Resource;

pub const OP_INDEX: usize = 0;
pub const SENDER_ID_INDEX: usize = 1;
pub const PAYLOAD_LEN_INDEX: usize = 5;
pub const RESOURCE_START_INDEX: usize = 9;

/// Update packet header length; records start immediately after.
pub const HEADER_LEN: usize = RESOURCE_START_INDEX;
/// The register message is exactly one header's worth of bytes.
pub const REGISTER_LEN: usize = 9;

/// Sender id stamped on server-originated broadcasts.
pub const SERVER_SENDER_ID: u32 = 0;

/// Latest-write-wins merge map: resource id to the most recently received
/// encoded record. Ordered, so the same contents always encode to the same
/// packet bytes.
pub type SnapshotMap = BTreeMap<u32, Vec<u8>>;

/// Packet operations, the first byte of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Register = 0,
    StateUpdate = 1,
}

impl Op {
    pub fn from_byte(byte: u8) -> Result<Op, WireError> {
        match byte {
            0 => Ok(Op::Register),
            1 => Ok(Op::StateUpdate),
            other => Err(WireError::UnknownOp(other)),
        }
    }
}

/// Errors raised while encoding or decoding datagrams.
///
/// These are per-datagram (or per-flush-cycle) failures: the offending
/// packet is dropped and processing continues, so none of them should ever
/// take the process down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    UnknownOp(u8),
    UnknownResourceType { tag: u8, offset: usize },
    Truncated { expected: usize, actual: usize },
    CapacityExceeded { needed: usize, capacity: usize },
    InvalidPort(u32),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::UnknownOp(op) => write!(f, "unknown operation byte {}", op),
            WireError::UnknownResourceType { tag, offset } => {
                write!(f, "unknown resource type {} at offset {}", tag, offset)
            }
            WireError::Truncated { expected, actual } => {
                write!(f, "truncated packet: expected {} bytes, have {}", expected, actual)
            }
            WireError::CapacityExceeded { needed, capacity } => {
                write!(f, "packet of {} bytes exceeds buffer capacity {}", needed, capacity)
            }
            WireError::InvalidPort(port) => write!(f, "listen port {} out of range", port),
        }
    }
}

impl Error for WireError {}

/// Header fields of a decoded update packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateHeader {
    pub op: Op,
    pub sender_id: u32,
    pub payload_len: usize,
}

/// A decoded register message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub client_id: u32,
    pub listen_port: u16,
}

/// Encodes an update packet from a list of resources (the client path).
///
/// Writes the header, packs each record contiguously from offset 9, then
/// patches the payload-length field with the final cursor. The total size
/// is checked up front so an undersized buffer fails before any write.
pub fn encode_update(
    buf: &mut [u8],
    sender_id: u32,
    resources: &[Resource],
) -> Result<usize, WireError> {
    let total = HEADER_LEN + resources.iter().map(Resource::encoded_len).sum::<usize>();
    if total > buf.len() {
        return Err(WireError::CapacityExceeded {
            needed: total,
            capacity: buf.len(),
        });
    }

    write_update_header(buf, sender_id);
    let mut idx = RESOURCE_START_INDEX;
    for resource in resources {
        idx += resource.encode_into(buf, idx)?;
    }
    patch_payload_len(buf, idx);

    Ok(idx)
}

/// Encodes an update packet from a merge map of pre-encoded records (the
/// server's flush path). Same framing and overflow behavior as
/// [`encode_update`].
pub fn encode_snapshot(
    buf: &mut [u8],
    sender_id: u32,
    map: &SnapshotMap,
) -> Result<usize, WireError> {
    let total = encoded_snapshot_len(map);
    if total > buf.len() {
        return Err(WireError::CapacityExceeded {
            needed: total,
            capacity: buf.len(),
        });
    }

    write_update_header(buf, sender_id);
    let mut idx = RESOURCE_START_INDEX;
    for record in map.values() {
        buf[idx..idx + record.len()].copy_from_slice(record);
        idx += record.len();
    }
    patch_payload_len(buf, idx);

    Ok(idx)
}

/// Packet length `map` would occupy once encoded, header included.
pub fn encoded_snapshot_len(map: &SnapshotMap) -> usize {
    HEADER_LEN + map.values().map(|record| record.len()).sum::<usize>()
}

/// Decodes an update packet, merging every record into `map` with
/// latest-write-wins semantics, and returns the header.
///
/// Record boundaries are validated before the map is touched: once a record
/// has an unknown tag the remaining boundaries are unrecoverable, so the
/// whole datagram is rejected and `map` is left unchanged.
pub fn decode_update(data: &[u8], map: &mut SnapshotMap) -> Result<UpdateHeader, WireError> {
    if data.len() < HEADER_LEN {
        return Err(WireError::Truncated {
            expected: HEADER_LEN,
            actual: data.len(),
        });
    }

    let op = Op::from_byte(data[OP_INDEX])?;
    let sender_id = read_u32(data, SENDER_ID_INDEX);
    let payload_len = read_u32(data, PAYLOAD_LEN_INDEX) as usize;

    if payload_len < HEADER_LEN {
        return Err(WireError::Truncated {
            expected: HEADER_LEN,
            actual: payload_len,
        });
    }
    if payload_len > data.len() {
        return Err(WireError::Truncated {
            expected: payload_len,
            actual: data.len(),
        });
    }

    let mut records = Vec::new();
    let mut idx = RESOURCE_START_INDEX;
    while idx < payload_len {
        let tag = data[idx];
        let len = Resource::encoded_len_for_tag(tag)
            .ok_or(WireError::UnknownResourceType { tag, offset: idx })?;
        if idx + len > payload_len {
            return Err(WireError::Truncated {
                expected: idx + len,
                actual: payload_len,
            });
        }
        records.push((read_u32(data, idx + 1), idx, idx + len));
        idx += len;
    }

    for (id, start, end) in records {
        map.insert(id, data[start..end].to_vec());
    }

    Ok(UpdateHeader {
        op,
        sender_id,
        payload_len,
    })
}

/// Encodes the fixed 9-byte register message.
pub fn encode_register(buf: &mut [u8], client_id: u32, listen_port: u16) -> Result<usize, WireError> {
    if buf.len() < REGISTER_LEN {
        return Err(WireError::CapacityExceeded {
            needed: REGISTER_LEN,
            capacity: buf.len(),
        });
    }

    buf[OP_INDEX] = Op::Register as u8;
    buf[SENDER_ID_INDEX..PAYLOAD_LEN_INDEX].copy_from_slice(&client_id.to_le_bytes());
    buf[PAYLOAD_LEN_INDEX..REGISTER_LEN].copy_from_slice(&(listen_port as u32).to_le_bytes());

    Ok(REGISTER_LEN)
}

/// Decodes a register message. The caller has already dispatched on the op
/// byte; this reads the client id and declared listen port.
pub fn decode_register(data: &[u8]) -> Result<Registration, WireError> {
    if data.len() < REGISTER_LEN {
        return Err(WireError::Truncated {
            expected: REGISTER_LEN,
            actual: data.len(),
        });
    }

    let client_id = read_u32(data, SENDER_ID_INDEX);
    let port = read_u32(data, PAYLOAD_LEN_INDEX);
    if port > u16::MAX as u32 {
        return Err(WireError::InvalidPort(port));
    }

    Ok(Registration {
        client_id,
        listen_port: port as u16,
    })
}

fn write_update_header(buf: &mut [u8], sender_id: u32) {
    buf[OP_INDEX] = Op::StateUpdate as u8;
    buf[SENDER_ID_INDEX..PAYLOAD_LEN_INDEX].copy_from_slice(&sender_id.to_le_bytes());
}

fn patch_payload_len(buf: &mut [u8], len: usize) {
    buf[PAYLOAD_LEN_INDEX..RESOURCE_START_INDEX].copy_from_slice(&(len as u32).to_le_bytes());
}

/// Reads a little-endian u32. Callers check bounds first.
pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Reads a little-endian f32. Callers check bounds first.
pub(crate) fn read_f32(data: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}
