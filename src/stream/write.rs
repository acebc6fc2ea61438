//! Blocking writes and the print family layered on them.

use super::core::ByteStream;
use crate::backend::StreamBackend;
use crate::error::{StreamError, StreamResult};
use std::fmt;
use std::time::Instant;

impl<B: StreamBackend> ByteStream<B> {
    /// One primitive write attempt; may accept only a prefix of `buf`.
    pub fn write_nonblock(&self, buf: &[u8]) -> StreamResult<usize> {
        self.backend().write_nonblock(buf)
    }

    /// Write every byte of `buf`, waiting for room as needed.
    ///
    /// Returns `buf.len()`; partial progress is never reported as success.
    /// Concurrent callers on the same `ByteStream` take turns, so each
    /// buffer reaches the backend contiguously.
    pub fn write_all(&self, buf: &[u8]) -> StreamResult<usize> {
        let _turn = self.write_guard();
        self.write_from(buf, self.deadline())
            .map_err(|(_, e)| e)
    }

    /// Like [`write_all`](Self::write_all), but on failure also reports how
    /// many bytes were accepted before the error.
    pub(crate) fn write_partial(&self, buf: &[u8]) -> Result<usize, (usize, StreamError)> {
        let _turn = self.write_guard();
        self.write_from(buf, self.deadline())
    }

    /// Caller holds the write turn.
    fn write_from(
        &self,
        buf: &[u8],
        deadline: Option<Instant>,
    ) -> Result<usize, (usize, StreamError)> {
        let mut written = 0;
        while written < buf.len() {
            match self.backend().write_nonblock(&buf[written..]) {
                Ok(0) | Err(StreamError::WouldBlock) => self
                    .backend()
                    .wait_writable(deadline)
                    .map_err(|e| (written, e))?,
                Ok(n) => written += n,
                Err(e) => return Err((written, e)),
            }
        }
        Ok(written)
    }

    /// Write each item in order, with nothing in between
    pub fn print<T: AsRef<[u8]>>(&self, items: &[T]) -> StreamResult<()> {
        let _turn = self.write_guard();
        let deadline = self.deadline();
        for item in items {
            self.write_from(item.as_ref(), deadline).map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    /// Write each item followed by the line separator, unless the item
    /// already ends with it. No items writes a lone separator.
    pub fn puts<T: AsRef<[u8]>>(&self, items: &[T]) -> StreamResult<()> {
        let _turn = self.write_guard();
        let deadline = self.deadline();
        let sep = &self.config().line_separator;
        let write = |bytes: &[u8]| self.write_from(bytes, deadline).map_err(|(_, e)| e);
        if items.is_empty() {
            write(sep.as_slice())?;
            return Ok(());
        }
        for item in items {
            let item = item.as_ref();
            write(item)?;
            if !item.ends_with(sep) {
                write(sep.as_slice())?;
            }
        }
        Ok(())
    }

    pub fn putc(&self, byte: u8) -> StreamResult<()> {
        self.write_all(&[byte]).map(|_| ())
    }

    /// Formatted write, e.g. `stream.printf(format_args!("{}: {}", k, v))`
    pub fn printf(&self, args: fmt::Arguments<'_>) -> StreamResult<usize> {
        match args.as_str() {
            Some(literal) => self.write_all(literal.as_bytes()),
            None => self.write_all(args.to_string().as_bytes()),
        }
    }
}
