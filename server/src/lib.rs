//! # State-Relay Server Library
//!
//! Implements a lossy-tolerant UDP relay for multiplayer simulation state:
//! clients push their local entity state to the server, the server merges
//! everything recently received into a single compact snapshot, and the
//! snapshot is rebroadcast to every registered client.
//!
//! ## Pipeline
//!
//! Three tasks connected by ownership transfers:
//!
//! - **Receiver** (`network`): owns the socket's inbound side, dispatches
//!   on the op byte. Registrations update the client registry; raw state
//!   updates are forwarded to the aggregator's channel.
//! - **Aggregator** (`aggregator`): folds datagrams into a latest-write-wins
//!   map keyed by resource id, then encodes the map into a pooled buffer
//!   and publishes it. Flushing is triggered by the inbound queue draining
//!   or by an accumulated-size watermark, whichever comes first.
//! - **Broadcaster** (`broadcaster`): waits for ready buffers and fans each
//!   one out to every address in the registry, then returns the buffer to
//!   the empty pool.
//!
//! The buffer pool (`buffer_pool`) is the only synchronization point
//! between aggregation and broadcast. Its fixed size doubles as the
//! backpressure mechanism: a stalled broadcaster leaves no empty buffers,
//! which suspends the aggregator rather than growing a queue.
//!
//! ## Error containment
//!
//! A malformed datagram, an oversized snapshot, or a failed send to one
//! client is logged and dropped; none of them stops the pipeline. The
//! protocol tolerates loss, since the next update supersedes whatever was
//! missed.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("0.0.0.0:5002", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod broadcaster;
pub mod buffer_pool;
pub mod network;
pub mod registry;
