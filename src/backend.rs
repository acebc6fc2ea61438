//! The capability set every byte stream is built on.

use crate::error::StreamResult;
use bytes::Bytes;
use std::io::SeekFrom;
use std::time::Instant;

/// Four primitives plus readiness waits.
///
/// `read_nonblock` and `write_nonblock` never suspend: they fail with
/// `WouldBlock` when no progress is possible. The `wait_*` methods suspend
/// until the corresponding primitive might succeed. Backends that are always
/// ready keep the default waits.
///
/// [`ByteStream`](crate::stream::ByteStream) builds the full reader/writer
/// API from these alone.
pub trait StreamBackend: Send + Sync {
    /// Return between 1 and `max_len` bytes (empty only for `max_len == 0`).
    /// Fails with `EndOfStream` once no more data will arrive.
    fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes>;

    /// Accept a prefix of `buf`, returning how many bytes were taken.
    fn write_nonblock(&self, buf: &[u8]) -> StreamResult<usize>;

    /// Best-effort seek; returns the new position.
    fn seek(&self, pos: SeekFrom) -> StreamResult<u64>;

    fn eof(&self) -> StreamResult<bool>;

    fn wait_readable(&self, _deadline: Option<Instant>) -> StreamResult<()> {
        Ok(())
    }

    fn wait_writable(&self, _deadline: Option<Instant>) -> StreamResult<()> {
        Ok(())
    }

    fn close(&self) -> StreamResult<()>;

    fn is_closed(&self) -> bool;
}

impl<B: StreamBackend + ?Sized> StreamBackend for std::sync::Arc<B> {
    fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes> {
        (**self).read_nonblock(max_len)
    }

    fn write_nonblock(&self, buf: &[u8]) -> StreamResult<usize> {
        (**self).write_nonblock(buf)
    }

    fn seek(&self, pos: SeekFrom) -> StreamResult<u64> {
        (**self).seek(pos)
    }

    fn eof(&self) -> StreamResult<bool> {
        (**self).eof()
    }

    fn wait_readable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        (**self).wait_readable(deadline)
    }

    fn wait_writable(&self, deadline: Option<Instant>) -> StreamResult<()> {
        (**self).wait_writable(deadline)
    }

    fn close(&self) -> StreamResult<()> {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
