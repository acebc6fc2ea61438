//! Layered byte stream operations
//!
//! [`ByteStream`] turns the four primitives of a [`StreamBackend`](crate::backend::StreamBackend)
//! into the full reader/writer surface: blocking and bulk reads, delimited
//! reads, single-unit reads, iterators, the print family and `std::io`
//! adapters.

pub mod core;
pub mod io;
pub mod iter;
pub mod lines;
pub mod write;

// Re-export core types
pub use self::core::ByteStream;
pub use self::iter::{ByteIter, CharIter, LineIter};
