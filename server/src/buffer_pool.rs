//! Reusable broadcast buffers rotated between the aggregator and the
//! broadcaster.
//!
//! Two FIFO queues of owned buffers connect the two tasks: `empty` feeds
//! the aggregator, `ready` feeds the broadcaster. Handing whole buffers
//! across as ownership transfers avoids both copying and shared locks, and
//! the fixed pool size bounds memory: when the broadcaster falls behind,
//! [`PoolWriter::acquire_empty`] suspends the aggregator instead of letting
//! a queue grow without limit.

use log::warn;
use tokio::sync::mpsc;

/// A fixed-capacity byte buffer plus the length of its valid prefix.
///
/// Allocated once when the pool is built and reused for the life of the
/// process. At any instant a buffer is owned by exactly one place: the
/// empty queue, the aggregator filling it, the ready queue, or the
/// broadcaster sending it.
#[derive(Debug)]
pub struct PooledBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl PooledBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The filled region, valid once the writer has set the length.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The whole writable capacity, regardless of the valid length.
    pub fn space(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Marks the first `len` bytes as valid for sending.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len;
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Aggregator-side handle: takes empty buffers, publishes filled ones.
#[derive(Debug)]
pub struct PoolWriter {
    empty_rx: mpsc::Receiver<PooledBuffer>,
    empty_tx: mpsc::Sender<PooledBuffer>,
    ready_tx: mpsc::Sender<PooledBuffer>,
}

/// Broadcaster-side handle: takes ready buffers, returns them empty.
#[derive(Debug)]
pub struct PoolReader {
    ready_rx: mpsc::Receiver<PooledBuffer>,
    empty_tx: mpsc::Sender<PooledBuffer>,
}

pub struct BufferPool;

impl BufferPool {
    /// Builds the two rotation queues with `count` buffers of `capacity`
    /// bytes pre-loaded into the empty queue.
    pub fn new(count: usize, capacity: usize) -> (PoolWriter, PoolReader) {
        assert!(count > 0, "buffer pool needs at least one buffer");

        let (empty_tx, empty_rx) = mpsc::channel(count);
        let (ready_tx, ready_rx) = mpsc::channel(count);

        for _ in 0..count {
            empty_tx
                .try_send(PooledBuffer::with_capacity(capacity))
                .expect("empty queue is sized to hold the whole pool");
        }

        (
            PoolWriter {
                empty_rx,
                empty_tx: empty_tx.clone(),
                ready_tx,
            },
            PoolReader { ready_rx, empty_tx },
        )
    }
}

impl PoolWriter {
    /// Suspends until an empty buffer is available. This is the
    /// backpressure point: a stalled broadcaster leaves this pending.
    /// Returns `None` once every other buffer owner has shut down.
    pub async fn acquire_empty(&mut self) -> Option<PooledBuffer> {
        self.empty_rx.recv().await
    }

    /// Moves a filled buffer into the ready queue. Never blocks: the queue
    /// is sized to hold every buffer in the pool.
    pub async fn publish_ready(&mut self, buffer: PooledBuffer) {
        if self.ready_tx.send(buffer).await.is_err() {
            warn!("Ready queue closed, dropping buffer");
        }
    }

    /// Returns an unused buffer straight to the empty queue, for flush
    /// cycles that fail before producing a packet.
    pub async fn recycle(&mut self, mut buffer: PooledBuffer) {
        buffer.clear();
        if self.empty_tx.send(buffer).await.is_err() {
            warn!("Empty queue closed, dropping buffer");
        }
    }
}

impl PoolReader {
    /// Suspends until a filled buffer is ready. Buffers come out in the
    /// order they were published; no reordering.
    pub async fn acquire_ready(&mut self) -> Option<PooledBuffer> {
        self.ready_rx.recv().await
    }

    /// Returns a fully sent buffer to the empty queue.
    pub async fn release_empty(&mut self, mut buffer: PooledBuffer) {
        buffer.clear();
        if self.empty_tx.send(buffer).await.is_err() {
            warn!("Empty queue closed, dropping buffer");
        }
    }
}
