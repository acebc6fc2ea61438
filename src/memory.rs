//! Fixed in-memory backend with a real cursor.
//!
//! Always readable and writable, so the blocking layer never waits on it.
//! Writes overwrite at the cursor and extend the buffer like `io::Cursor`.

use crate::backend::StreamBackend;
use crate::error::{StreamError, StreamResult};
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::SeekFrom;

#[derive(Debug, Default)]
struct Buffer {
    data: Vec<u8>,
    pos: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Buffer>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Mutex::new(Buffer {
                data: data.into(),
                ..Default::default()
            }),
        }
    }

    /// Copy of the whole buffer, independent of the cursor
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner().data
    }
}

impl StreamBackend for MemoryBackend {
    fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes> {
        let mut buf = self.inner.lock();
        if buf.closed {
            return Err(StreamError::StreamClosed);
        }
        if buf.pos >= buf.data.len() {
            return Err(StreamError::EndOfStream);
        }
        let end = buf.data.len().min(buf.pos.saturating_add(max_len));
        let out = Bytes::copy_from_slice(&buf.data[buf.pos..end]);
        buf.pos = end;
        Ok(out)
    }

    fn write_nonblock(&self, src: &[u8]) -> StreamResult<usize> {
        let mut buf = self.inner.lock();
        if buf.closed {
            return Err(StreamError::StreamClosed);
        }
        let pos = buf.pos;
        let end = pos
            .checked_add(src.len())
            .ok_or_else(|| StreamError::invalid("write past addressable memory"))?;
        if buf.data.len() < end {
            let grow = end - buf.data.len();
            buf.data
                .try_reserve(grow)
                .map_err(|e| StreamError::invalid(format!("cannot grow buffer to {}: {}", end, e)))?;
            buf.data.resize(end, 0);
        }
        buf.data[pos..end].copy_from_slice(src);
        buf.pos = end;
        Ok(src.len())
    }

    fn seek(&self, pos: SeekFrom) -> StreamResult<u64> {
        let mut buf = self.inner.lock();
        if buf.closed {
            return Err(StreamError::StreamClosed);
        }
        let invalid = || StreamError::invalid(format!("cannot seek to {:?}", pos));
        let target = match pos {
            SeekFrom::Start(n) => usize::try_from(n).ok(),
            SeekFrom::End(n) => offset_from(buf.data.len(), n),
            SeekFrom::Current(n) => offset_from(buf.pos, n),
        }
        .ok_or_else(invalid)?;
        buf.pos = target;
        Ok(target as u64)
    }

    fn eof(&self) -> StreamResult<bool> {
        let buf = self.inner.lock();
        if buf.closed {
            return Err(StreamError::StreamClosed);
        }
        Ok(buf.pos >= buf.data.len())
    }

    fn close(&self) -> StreamResult<()> {
        let mut buf = self.inner.lock();
        if buf.closed {
            return Err(StreamError::StreamClosed);
        }
        buf.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

fn offset_from(base: usize, offset: i64) -> Option<usize> {
    let base = i64::try_from(base).ok()?;
    let target = base.checked_add(offset)?;
    usize::try_from(target).ok()
}
