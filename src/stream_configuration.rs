//! Configuration types for byte streams

use crate::error::{StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-instance stream settings.
///
/// Everything a reader or writer would otherwise pull from process-wide
/// defaults (line separator, chunk size for bulk reads, wait deadline) lives
/// here and travels with the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum pending bytes before writers block (`None` for unbounded)
    pub capacity: Option<usize>,
    /// Separator used by `gets`/`lines`/`puts`
    pub line_separator: Vec<u8>,
    /// Size of each primitive read issued by `read_all`
    pub read_chunk_size: usize,
    /// Deadline applied to every blocking wait (`None` waits indefinitely)
    pub default_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            line_separator: b"\n".to_vec(),
            read_chunk_size: 8192,
            default_timeout: None,
        }
    }
}

impl StreamConfig {
    /// Create a new stream configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of pending bytes
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the line separator
    pub fn line_separator(mut self, separator: impl Into<Vec<u8>>) -> Self {
        self.line_separator = separator.into();
        self
    }

    /// Set the chunk size used for bulk reads
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the deadline for blocking waits
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> StreamResult<()> {
        if self.capacity == Some(0) {
            return Err(StreamError::invalid("capacity must be greater than 0"));
        }
        if self.line_separator.is_empty() {
            return Err(StreamError::invalid("line separator must not be empty"));
        }
        if self.read_chunk_size == 0 {
            return Err(StreamError::invalid("read chunk size must be greater than 0"));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> StreamResult<Self> {
        let config: StreamConfig = serde_json::from_str(json)
            .map_err(|e| StreamError::invalid(format!("malformed stream config: {}", e)))?;
        if let Err(e) = config.validate() {
            log::debug!("Rejected stream config: {}", e);
            return Err(e);
        }
        Ok(config)
    }

    pub fn to_json(&self) -> StreamResult<String> {
        serde_json::to_string(self).map_err(|e| StreamError::IO(e.to_string()))
    }
}
