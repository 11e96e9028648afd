//! Inbound state aggregation: the merge map and its flush policy.

use log::{debug, error, warn};
use shared::protocol::{self, SnapshotMap, SERVER_SENDER_ID};
use tokio::sync::mpsc;

use crate::buffer_pool::{PoolWriter, PooledBuffer};

/// Folds raw update datagrams into a latest-write-wins snapshot and hands
/// the encoded result to the broadcast pipeline.
///
/// The loop alternates two phases. *Accumulate*: wait for the first
/// datagram, then drain whatever else is immediately available, letting
/// later updates for the same resource id overwrite earlier ones. *Flush*:
/// acquire an empty pooled buffer, encode the whole map into it, publish
/// it ready, and clear the map for the next cycle.
///
/// The watermark bounds packet size and latency under bursty input: once
/// the encoded snapshot would pass it, the cycle flushes immediately
/// instead of waiting for the inbound queue to drain.
pub struct Aggregator {
    snapshot: SnapshotMap,
    watermark: usize,
}

impl Aggregator {
    pub fn new(watermark: usize) -> Self {
        Self {
            snapshot: SnapshotMap::new(),
            watermark,
        }
    }

    /// Runs the accumulate/flush loop until the inbound channel closes or
    /// the buffer pool shuts down.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
        mut pool: PoolWriter,
    ) {
        while let Some(datagram) = inbound.recv().await {
            self.absorb(&datagram);

            // Drain without blocking until the queue is empty or the
            // snapshot passes the watermark.
            while self.encoded_len() < self.watermark {
                match inbound.try_recv() {
                    Ok(datagram) => self.absorb(&datagram),
                    Err(_) => break,
                }
            }

            if self.snapshot.is_empty() {
                // Every accumulated datagram was malformed.
                continue;
            }

            let Some(buffer) = pool.acquire_empty().await else {
                break;
            };
            self.flush(buffer, &mut pool).await;
        }

        debug!("Aggregator stopped");
    }

    /// Merges one raw datagram into the snapshot. A malformed datagram is
    /// dropped whole and the stream continues.
    fn absorb(&mut self, datagram: &[u8]) {
        match protocol::decode_update(datagram, &mut self.snapshot) {
            Ok(header) => debug!(
                "Merged update from sender {} ({} resources in snapshot)",
                header.sender_id,
                self.snapshot.len()
            ),
            Err(e) => warn!("Dropping malformed update datagram: {}", e),
        }
    }

    /// Encodes the snapshot into `buffer` and publishes it. A snapshot too
    /// large for the buffer drops the cycle: the buffer goes back to the
    /// empty queue unwritten and the map is cleared so the next cycle
    /// starts fresh.
    async fn flush(&mut self, mut buffer: PooledBuffer, pool: &mut PoolWriter) {
        match protocol::encode_snapshot(buffer.space(), SERVER_SENDER_ID, &self.snapshot) {
            Ok(len) => {
                buffer.set_len(len);
                pool.publish_ready(buffer).await;
            }
            Err(e) => {
                error!(
                    "Dropping snapshot of {} resources: {}",
                    self.snapshot.len(),
                    e
                );
                pool.recycle(buffer).await;
            }
        }
        self.snapshot.clear();
    }

    /// Packet size the current snapshot would encode to.
    fn encoded_len(&self) -> usize {
        protocol::encoded_snapshot_len(&self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;
    use shared::protocol::HEADER_LEN;
    use shared::resource::{Player, Resource, PLAYER_LEN};
    use std::time::Duration;
    use tokio::time::timeout;

    fn update_datagram(sender: u32, health: u32) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let player = Resource::Player(Player {
            id: sender,
            health,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        });
        let len = protocol::encode_update(&mut buf, sender, &[player]).unwrap();
        buf[..len].to_vec()
    }

    #[tokio::test]
    async fn flushes_merged_snapshot_to_pool() {
        let (writer, mut reader) = BufferPool::new(2, 256);
        let (tx, rx) = mpsc::unbounded_channel();

        // Both datagrams are queued before the loop starts, so they land
        // in a single accumulation cycle.
        tx.send(update_datagram(1, 5)).unwrap();
        tx.send(update_datagram(2, 8)).unwrap();
        drop(tx);

        let handle = tokio::spawn(Aggregator::new(4096).run(rx, writer));

        let buffer = reader.acquire_ready().await.unwrap();
        let mut map = SnapshotMap::new();
        protocol::decode_update(buffer.filled(), &mut map).unwrap();

        assert_eq!(map.len(), 2);
        match Resource::decode(&map[&1]).unwrap() {
            Resource::Player(p) => assert_eq!(p.health, 5),
            _ => panic!("wrong resource kind"),
        }
        reader.release_empty(buffer).await;

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn later_update_wins_within_a_cycle() {
        let (writer, mut reader) = BufferPool::new(2, 256);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(update_datagram(1, 5)).unwrap();
        tx.send(update_datagram(1, 9)).unwrap();
        drop(tx);

        tokio::spawn(Aggregator::new(4096).run(rx, writer));

        let buffer = reader.acquire_ready().await.unwrap();
        let mut map = SnapshotMap::new();
        protocol::decode_update(buffer.filled(), &mut map).unwrap();

        assert_eq!(map.len(), 1);
        match Resource::decode(&map[&1]).unwrap() {
            Resource::Player(p) => assert_eq!(p.health, 9),
            _ => panic!("wrong resource kind"),
        }
    }

    #[tokio::test]
    async fn watermark_splits_bursts_into_multiple_flushes() {
        let (writer, mut reader) = BufferPool::new(4, 256);
        let (tx, rx) = mpsc::unbounded_channel();

        // Watermark below one record: every datagram flushes on its own.
        let watermark = HEADER_LEN + PLAYER_LEN - 1;
        for id in 1..=3 {
            tx.send(update_datagram(id, id)).unwrap();
        }
        drop(tx);

        tokio::spawn(Aggregator::new(watermark).run(rx, writer));

        for expected_id in 1..=3u32 {
            let buffer = reader.acquire_ready().await.unwrap();
            let mut map = SnapshotMap::new();
            protocol::decode_update(buffer.filled(), &mut map).unwrap();

            assert_eq!(map.len(), 1, "watermark flush should hold one record");
            assert!(map.contains_key(&expected_id));
            reader.release_empty(buffer).await;
        }
    }

    #[tokio::test]
    async fn malformed_datagram_is_dropped_not_fatal() {
        let (writer, mut reader) = BufferPool::new(2, 256);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(vec![0xFF, 0x01, 0x02]).unwrap(); // short, unknown op
        tx.send(update_datagram(1, 7)).unwrap();
        drop(tx);

        tokio::spawn(Aggregator::new(4096).run(rx, writer));

        let buffer = reader.acquire_ready().await.unwrap();
        let mut map = SnapshotMap::new();
        protocol::decode_update(buffer.filled(), &mut map).unwrap();

        assert_eq!(map.len(), 1);
        assert!(map.contains_key(&1));
    }

    #[tokio::test]
    async fn oversized_snapshot_drops_cycle_and_recycles_buffer() {
        // Capacity too small for even one record.
        let (writer, mut reader) = BufferPool::new(1, HEADER_LEN + 4);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(update_datagram(1, 5)).unwrap();
        tx.send(update_datagram(2, 6)).unwrap();
        drop(tx);

        // Watermark of one header forces a flush per datagram, so the
        // second cycle can only proceed if the first recycled its buffer.
        let handle = tokio::spawn(Aggregator::new(HEADER_LEN).run(rx, writer));

        // Nothing is ever published, and the loop terminates cleanly,
        // which requires the single pool buffer to have been recycled for
        // the second cycle.
        assert!(timeout(Duration::from_millis(100), reader.acquire_ready())
            .await
            .is_err());
        handle.await.unwrap();
    }
}
