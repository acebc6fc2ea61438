//! Queue-backed byte stream
//!
//! Producers append byte chunks and eventually end the input; consumers take
//! bytes from the head in FIFO order. A read that asks for fewer bytes than
//! the head chunk holds splits it and leaves the suffix at the head, so byte
//! order is preserved across partial reads.

use crate::backend::StreamBackend;
use crate::error::{StreamError, StreamResult};
use crate::readiness::{Direction, Readiness, ReadinessGate};
use crate::stream_configuration::StreamConfig;
use crate::stream_performance_metrics::StreamMetrics;
use async_stream::stream;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::collections::VecDeque;
use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Chunk(Bytes),
    /// Pushed once by `end_input`, always last.
    Eof,
}

struct QueueState {
    slots: VecDeque<Slot>,
    pending_bytes: usize,
    capacity: Option<usize>,
    position: u64,
    ended: bool,
    closed: bool,
    metrics: StreamMetrics,
}

impl QueueState {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: VecDeque::new(),
            pending_bytes: 0,
            capacity,
            position: 0,
            ended: false,
            closed: false,
            metrics: StreamMetrics::new(),
        }
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.closed {
            Err(StreamError::StreamClosed)
        } else {
            Ok(())
        }
    }

    fn eof(&self) -> StreamResult<bool> {
        self.ensure_open()?;
        Ok(self.ended && self.slots.len() <= 1)
    }

    fn push_chunk(&mut self, chunk: Bytes) {
        self.pending_bytes += chunk.len();
        self.metrics.record_append(chunk.len());
        self.slots.push_back(Slot::Chunk(chunk));
    }

    fn append(&mut self, chunk: Bytes) -> StreamResult<()> {
        self.ensure_open()?;
        if self.ended {
            return Err(StreamError::StreamEnded);
        }
        if !chunk.is_empty() {
            self.push_chunk(chunk);
        }
        Ok(())
    }

    /// Accept as much of `buf` as the free capacity allows.
    fn accept(&mut self, buf: &[u8]) -> StreamResult<usize> {
        self.ensure_open()?;
        if self.ended {
            return Err(StreamError::StreamEnded);
        }
        let free = match self.capacity {
            Some(capacity) => capacity.saturating_sub(self.pending_bytes),
            None => buf.len(),
        };
        let take = free.min(buf.len());
        if take > 0 {
            self.push_chunk(Bytes::copy_from_slice(&buf[..take]));
        }
        Ok(take)
    }

    fn dequeue(&mut self, max_len: usize) -> StreamResult<Bytes> {
        if self.eof()? {
            return Err(StreamError::EndOfStream);
        }
        if max_len == 0 {
            return Ok(Bytes::new());
        }
        let mut chunk = match self.slots.pop_front() {
            Some(Slot::Chunk(chunk)) if !chunk.is_empty() => chunk,
            Some(Slot::Chunk(_)) => {
                return Err(StreamError::ProtocolError("empty chunk at queue head".into()))
            }
            Some(Slot::Eof) => {
                self.slots.push_front(Slot::Eof);
                return Err(StreamError::ProtocolError(
                    "end-of-input marker ahead of pending data".into(),
                ));
            }
            // Unreachable through the gate: an empty queue is never readable.
            None => return Err(StreamError::WouldBlock),
        };

        let split = chunk.len() > max_len;
        if split {
            let rest = chunk.split_off(max_len);
            log::trace!("Split head chunk: delivering {}, keeping {}", max_len, rest.len());
            self.slots.push_front(Slot::Chunk(rest));
        }
        self.pending_bytes -= chunk.len();
        self.position += chunk.len() as u64;
        self.metrics.record_read(chunk.len(), split);
        Ok(chunk)
    }

    fn close(&mut self) -> StreamResult<()> {
        self.ensure_open()?;
        self.slots.clear();
        self.pending_bytes = 0;
        self.closed = true;
        Ok(())
    }
}

impl Readiness for QueueState {
    /// The end-of-input marker and a closed queue both count as readable:
    /// the read primitive then fails immediately instead of blocking.
    fn is_readable(&self) -> bool {
        self.closed || !self.slots.is_empty()
    }

    fn is_writable(&self) -> bool {
        self.closed
            || self.ended
            || self.capacity.map_or(true, |capacity| self.pending_bytes < capacity)
    }

    fn on_would_block(&mut self, _direction: Direction) {
        self.metrics.record_would_block();
    }

    fn on_wait(&mut self, _direction: Direction) {
        self.metrics.record_wait();
    }
}

/// Thread-safe FIFO byte queue with explicit end of input.
///
/// Cloning produces another handle to the same queue, so producers and
/// consumers on different threads each hold their own `StreamQueue`.
#[derive(Clone)]
pub struct StreamQueue {
    gate: Arc<ReadinessGate<QueueState>>,
    default_timeout: Option<Duration>,
}

impl Default for StreamQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl StreamQueue {
    /// Create a queue that never applies write backpressure
    pub fn unbounded() -> Self {
        Self::from_parts(None, None)
    }

    /// Create a queue whose write primitive accepts at most `capacity`
    /// pending bytes. A zero capacity is rejected.
    pub fn bounded(capacity: usize) -> StreamResult<Self> {
        if capacity == 0 {
            return Err(StreamError::invalid("capacity must be greater than 0"));
        }
        Ok(Self::from_parts(Some(capacity), None))
    }

    pub fn with_config(config: &StreamConfig) -> StreamResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config.capacity, config.default_timeout))
    }

    fn from_parts(capacity: Option<usize>, default_timeout: Option<Duration>) -> Self {
        Self {
            gate: Arc::new(ReadinessGate::new(QueueState::new(capacity))),
            default_timeout,
        }
    }

    /// Append a chunk at the tail. Empty chunks are accepted and dropped.
    ///
    /// Always enqueues the whole chunk, even past the capacity of a bounded
    /// queue; use the write primitive for backpressure.
    pub fn append(&self, bytes: impl Into<Bytes>) -> StreamResult<()> {
        let chunk = bytes.into();
        self.gate.update(|state| state.append(chunk))
    }

    /// Signal that no further chunks will be appended. Idempotent.
    pub fn end_input(&self) -> StreamResult<()> {
        let mut result = Ok(());
        self.gate.update_readable(|state| {
            if state.closed {
                result = Err(StreamError::StreamClosed);
            } else if !state.ended {
                state.slots.push_back(Slot::Eof);
                state.ended = true;
                log::debug!("Stream input ended with {} bytes pending", state.pending_bytes);
            }
            state.is_readable()
        });
        // Writers blocked on a full queue must observe `StreamEnded`.
        self.gate.update_writable(|state| state.is_writable());
        result
    }

    /// True once input has ended and every pending byte was delivered
    pub fn eof(&self) -> StreamResult<bool> {
        self.gate.with_state(|state| state.eof())
    }

    /// Take up to `max_len` bytes from the head without blocking
    pub fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes> {
        self.gate.try_nonblock_read(|state| state.dequeue(max_len))
    }

    /// Take up to `max_len` bytes, blocking until data or end of input
    /// arrives (or the configured timeout passes)
    pub fn read(&self, max_len: usize) -> StreamResult<Bytes> {
        self.read_until(max_len, self.deadline())
    }

    /// Like [`read`](Self::read) with an explicit timeout
    pub fn read_timeout(&self, max_len: usize, timeout: Duration) -> StreamResult<Bytes> {
        self.read_until(max_len, Some(Instant::now() + timeout))
    }

    fn read_until(&self, max_len: usize, deadline: Option<Instant>) -> StreamResult<Bytes> {
        loop {
            match self.read_nonblock(max_len) {
                Err(StreamError::WouldBlock) => self.gate.await_readable(deadline)?,
                other => return other,
            }
        }
    }

    /// Accept a prefix of `buf` bounded by free capacity without blocking
    pub fn write_nonblock(&self, buf: &[u8]) -> StreamResult<usize> {
        self.gate.try_nonblock_write(|state| state.accept(buf))
    }

    /// Wait (without blocking the thread) until a read would not block
    pub async fn readable(&self) {
        self.gate.readable().await
    }

    /// Wait (without blocking the thread) until a write would not block
    pub async fn writable(&self) {
        self.gate.writable().await
    }

    /// Async counterpart of [`read`](Self::read)
    pub async fn read_async(&self, max_len: usize) -> StreamResult<Bytes> {
        loop {
            match self.read_nonblock(max_len) {
                Err(StreamError::WouldBlock) => self.readable().await,
                other => return other,
            }
        }
    }

    /// Async counterpart of a blocking write: returns once all of `buf` is
    /// queued
    pub async fn write_async(&self, buf: &[u8]) -> StreamResult<usize> {
        let mut written = 0;
        while written < buf.len() {
            match self.write_nonblock(&buf[written..]) {
                Ok(0) | Err(StreamError::WouldBlock) => self.writable().await,
                Ok(n) => written += n,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Drain whole chunks as an async stream, ending at end of input or close
    pub fn chunks(&self) -> BoxStream<'static, Bytes> {
        let queue = self.clone();
        let stream = stream! {
            loop {
                match queue.read_async(usize::MAX).await {
                    Ok(chunk) => yield chunk,
                    Err(_) => break,
                }
            }
        };
        Box::pin(stream)
    }

    /// Discard pending bytes and close the queue. Wakes every blocked reader
    /// and writer; they fail with `StreamClosed`.
    pub fn close(&self) -> StreamResult<()> {
        self.gate.update(|state| state.close())?;
        log::debug!("Stream queue closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.gate.with_state(|state| state.closed)
    }

    pub fn is_ended(&self) -> bool {
        self.gate.with_state(|state| state.ended)
    }

    /// Bytes delivered to consumers so far
    pub fn position(&self) -> u64 {
        self.gate.with_state(|state| state.position)
    }

    pub fn pending_bytes(&self) -> usize {
        self.gate.with_state(|state| state.pending_bytes)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.gate.with_state(|state| state.capacity)
    }

    /// Change the write bound; raising it releases blocked writers
    pub fn set_capacity(&self, capacity: Option<usize>) -> StreamResult<()> {
        if capacity == Some(0) {
            return Err(StreamError::invalid("capacity must be greater than 0"));
        }
        self.gate.update_writable(|state| {
            state.capacity = capacity;
            state.is_writable()
        });
        Ok(())
    }

    pub fn metrics(&self) -> StreamMetrics {
        self.gate.with_state(|state| state.metrics.clone())
    }

    /// Get queue statistics for monitoring
    pub fn stats(&self) -> QueueStats {
        self.gate.with_state(|state| {
            let utilization = match state.capacity {
                Some(capacity) => state.pending_bytes as f64 / capacity as f64,
                None => 0.0,
            };
            QueueStats {
                pending_chunks: state
                    .slots
                    .iter()
                    .filter(|slot| matches!(slot, Slot::Chunk(_)))
                    .count(),
                pending_bytes: state.pending_bytes,
                position: state.position,
                capacity: state.capacity,
                utilization,
                is_ended: state.ended,
                is_closed: state.closed,
            }
        })
    }

    fn deadline(&self) -> Option<Instant> {
        self.default_timeout.map(|timeout| Instant::now() + timeout)
    }
}

impl StreamBackend for StreamQueue {
    fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes> {
        StreamQueue::read_nonblock(self, max_len)
    }

    fn write_nonblock(&self, buf: &[u8]) -> StreamResult<usize> {
        StreamQueue::write_nonblock(self, buf)
    }

    /// Only reports or restates the current position; the queue cannot rewind.
    fn seek(&self, pos: SeekFrom) -> StreamResult<u64> {
        let (position, closed) = self.gate.with_state(|state| (state.position, state.closed));
        if closed {
            return Err(StreamError::StreamClosed);
        }
        match pos {
            SeekFrom::Current(0) => Ok(position),
            SeekFrom::Start(target) if target == position => Ok(position),
            other => Err(StreamError::unsupported(format!(
                "queue streams cannot seek to {:?} from position {}",
                other, position
            ))),
        }
    }

    fn eof(&self) -> StreamResult<bool> {
        StreamQueue::eof(self)
    }

    fn wait_readable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        self.gate.await_readable(deadline)
    }

    fn wait_writable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        self.gate.await_writable(deadline)
    }

    fn close(&self) -> StreamResult<()> {
        StreamQueue::close(self)
    }

    fn is_closed(&self) -> bool {
        StreamQueue::is_closed(self)
    }
}

/// Queue statistics for monitoring and debugging
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub pending_chunks: usize,
    pub pending_bytes: usize,
    pub position: u64,
    pub capacity: Option<usize>,
    pub utilization: f64, // 0.0 to 1.0 for bounded queues
    pub is_ended: bool,
    pub is_closed: bool,
}

impl fmt::Display for QueueStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = match (self.is_closed, self.is_ended) {
            (true, _) => ", closed",
            (false, true) => ", ended",
            (false, false) => "",
        };
        match self.capacity {
            Some(cap) => write!(
                f,
                "StreamQueue({} chunks, {}/{} bytes, {:.1}%, pos {}{})",
                self.pending_chunks,
                self.pending_bytes,
                cap,
                self.utilization * 100.0,
                self.position,
                flags
            ),
            None => write!(
                f,
                "StreamQueue({} chunks, {} bytes, unbounded, pos {}{})",
                self.pending_chunks, self.pending_bytes, self.position, flags
            ),
        }
    }
}

impl fmt::Debug for StreamQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("StreamQueue")
            .field("pending_chunks", &stats.pending_chunks)
            .field("pending_bytes", &stats.pending_bytes)
            .field("position", &stats.position)
            .field("capacity", &stats.capacity)
            .field("is_ended", &stats.is_ended)
            .field("is_closed", &stats.is_closed)
            .finish()
    }
}
