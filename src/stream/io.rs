//! `std::io` adapters, so a byte stream plugs into anything expecting
//! `Read`, `Write` or `Seek`.
//!
//! End of stream reads as `Ok(0)`; other errors convert through
//! `From<StreamError> for io::Error`.

use super::core::ByteStream;
use crate::backend::StreamBackend;
use crate::error::StreamError;
use std::io::{self, Read, Seek, SeekFrom, Write};

impl<B: StreamBackend> Read for &ByteStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_blocking(buf.len()) {
            Ok(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Err(StreamError::EndOfStream) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl<B: StreamBackend> Write for &ByteStream<B> {
    /// Reports accepted bytes instead of an error once any were queued.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.write_partial(buf) {
            Ok(written) => Ok(written),
            Err((0, e)) => Err(e.into()),
            Err((written, e)) => {
                log::debug!("Short write of {} bytes before: {}", written, e);
                Ok(written)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: StreamBackend> Seek for &ByteStream<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(ByteStream::seek(*self, pos)?)
    }
}

impl<B: StreamBackend> Read for ByteStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (&*self).read(buf)
    }
}

impl<B: StreamBackend> Write for ByteStream<B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self).flush()
    }
}

impl<B: StreamBackend> Seek for ByteStream<B> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(ByteStream::seek(&*self, pos)?)
    }
}
