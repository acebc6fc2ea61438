//! Throughput counters for byte streams
//!
//! Counters are updated under the owning queue's lock, so plain integers are
//! enough here.

use std::time::{Duration, Instant};

/// Metrics collected for a stream queue
#[derive(Debug, Clone, Default)]
pub struct StreamMetrics {
    pub chunks_appended: u64,
    pub bytes_appended: u64,
    pub reads: u64,
    /// Reads that returned only a prefix of the head chunk
    pub split_reads: u64,
    pub bytes_delivered: u64,
    /// Non-blocking attempts refused with `WouldBlock`
    pub would_blocks: u64,
    /// Blocking waits that had to park at least once
    pub waits: u64,
    pub start_time: Option<Instant>,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_append(&mut self, size_bytes: usize) {
        self.chunks_appended += 1;
        self.bytes_appended += size_bytes as u64;
    }

    pub fn record_read(&mut self, size_bytes: usize, split: bool) {
        self.reads += 1;
        self.bytes_delivered += size_bytes as u64;
        if split {
            self.split_reads += 1;
        }
    }

    pub fn record_would_block(&mut self) {
        self.would_blocks += 1;
    }

    pub fn record_wait(&mut self) {
        self.waits += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    pub fn throughput_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.bytes_delivered as f64 / secs
        } else {
            0.0
        }
    }
}
