//! Thread-safe, queue-backed byte streams.
//!
//! Producers [`append`](StreamQueue::append) chunks and
//! [`end_input`](StreamQueue::end_input); consumers read through a
//! [`ByteStream`] with blocking, non-blocking or async calls.
//!
//! ```
//! use rs2_bytestream::ByteStream;
//! use std::thread;
//!
//! let stream = ByteStream::queue();
//! let producer = stream.producer();
//! let handle = thread::spawn(move || {
//!     producer.append("hello ").unwrap();
//!     producer.append("world\n").unwrap();
//!     producer.end_input().unwrap();
//! });
//!
//! assert_eq!(stream.gets().unwrap(), Some(b"hello world\n".to_vec()));
//! assert_eq!(stream.gets().unwrap(), None);
//! handle.join().unwrap();
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod queue;
pub mod readiness;
pub mod stream;

pub mod stream_configuration;
pub mod stream_performance_metrics;

pub use backend::StreamBackend;
pub use error::{StreamError, StreamResult};
pub use memory::MemoryBackend;
pub use queue::{QueueStats, StreamQueue};
pub use readiness::{Readiness, ReadinessGate};
pub use stream::ByteStream;
pub use stream_configuration::StreamConfig;
pub use stream_performance_metrics::StreamMetrics;
