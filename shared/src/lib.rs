//! Wire protocol shared by the state-relay server and its clients.
//!
//! The protocol is a fixed little-endian binary layout rather than a
//! self-describing format: every packet starts with a one-byte operation,
//! and state updates carry a sequence of fixed-size entity records whose
//! lengths are determined entirely by their type tag. The same framing is
//! used in both directions, so a client decodes server broadcasts with the
//! exact code the server uses to decode client updates.
//!
//! - [`resource`] defines the entity records (players, projectiles) and
//!   their binary encoding.
//! - [`protocol`] defines the packet framing, the register message, and the
//!   latest-write-wins snapshot map the server merges updates into.

pub mod protocol;
pub mod resource;

pub use protocol::{Op, Registration, SnapshotMap, UpdateHeader, WireError, SERVER_SENDER_ID};
pub use resource::{Player, Projectile, Resource};
