//! The layered byte stream: blocking reads and lifecycle built on a backend's
//! primitives.

use crate::backend::StreamBackend;
use crate::error::{StreamError, StreamResult};
use crate::queue::StreamQueue;
use crate::stream_configuration::StreamConfig;
use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::io::SeekFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Full reader/writer API over any [`StreamBackend`].
///
/// All methods take `&self`, so one `ByteStream` can be shared between
/// threads behind an `Arc`. Bytes read past a delimiter, and bytes handed back
/// through `ungetbyte`/`ungetc`, are held in a per-stream read-back buffer and
/// served before the backend is consulted again. Blocking writes through
/// one `ByteStream` are serialized, so each `write_all` lands contiguously.
pub struct ByteStream<B> {
    backend: B,
    config: StreamConfig,
    readback: Mutex<Vec<u8>>,
    write_lock: Mutex<()>,
    lineno: AtomicU64,
}

impl<B: StreamBackend> ByteStream<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StreamConfig::default(),
            readback: Mutex::new(Vec::new()),
            write_lock: Mutex::new(()),
            lineno: AtomicU64::new(0),
        }
    }

    pub fn with_config(backend: B, config: StreamConfig) -> StreamResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(backend)
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.config
            .default_timeout
            .map(|timeout| Instant::now() + timeout)
    }

    /// Push bytes back so the next read returns them first.
    pub fn unread(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut readback = self.readback.lock();
        readback.splice(0..0, bytes.iter().copied());
    }

    /// Hand a partial result back after a failed read. A closed stream
    /// keeps nothing.
    pub(crate) fn restore(&self, bytes: &[u8], err: &StreamError) {
        if *err != StreamError::StreamClosed && !self.backend.is_closed() {
            self.unread(bytes);
        }
    }

    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    fn ensure_open(&self) -> StreamResult<()> {
        if self.backend.is_closed() {
            Err(StreamError::StreamClosed)
        } else {
            Ok(())
        }
    }

    fn take_readback(&self, max_len: usize) -> Option<Bytes> {
        let mut readback = self.readback.lock();
        if readback.is_empty() {
            return None;
        }
        let take = max_len.min(readback.len());
        Some(readback.drain(..take).collect::<Vec<u8>>().into())
    }

    /// One primitive read attempt; fails with `WouldBlock` instead of waiting.
    pub fn read_nonblock(&self, max_len: usize) -> StreamResult<Bytes> {
        self.ensure_open()?;
        if let Some(bytes) = self.take_readback(max_len) {
            return Ok(bytes);
        }
        self.backend.read_nonblock(max_len)
    }

    /// Return up to `max_len` bytes, waiting until at least one is available.
    ///
    /// Fails with `EndOfStream` at the end of input and `Timeout` if the
    /// configured deadline passes first.
    pub fn read_blocking(&self, max_len: usize) -> StreamResult<Bytes> {
        self.read_before(max_len, self.deadline())
    }

    pub(crate) fn read_before(
        &self,
        max_len: usize,
        deadline: Option<Instant>,
    ) -> StreamResult<Bytes> {
        loop {
            match self.read_nonblock(max_len) {
                Err(StreamError::WouldBlock) => self.backend.wait_readable(deadline)?,
                other => return other,
            }
        }
    }

    /// Read until end of input. Returns an empty buffer if nothing remains.
    pub fn read_all(&self) -> StreamResult<Vec<u8>> {
        let deadline = self.deadline();
        let mut out = Vec::new();
        while !self.eof()? {
            match self.read_before(self.config.read_chunk_size, deadline) {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(StreamError::EndOfStream) => break,
                Err(e) => {
                    self.restore(&out, &e);
                    return Err(e);
                }
            }
        }
        Ok(out)
    }

    /// Read until `n` bytes are collected or input ends.
    ///
    /// `None` means the stream was already at its end before reading; a
    /// stream that ends while reading yields the (possibly empty) bytes
    /// collected so far.
    pub fn read_up_to(&self, n: usize) -> StreamResult<Option<Vec<u8>>> {
        if n == 0 {
            return Ok(Some(Vec::new()));
        }
        if self.eof()? {
            return Ok(None);
        }
        let deadline = self.deadline();
        let mut out = Vec::with_capacity(n.min(self.config.read_chunk_size));
        while out.len() < n && !self.eof()? {
            match self.read_before(n - out.len(), deadline) {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(StreamError::EndOfStream) => break,
                Err(e) => {
                    self.restore(&out, &e);
                    return Err(e);
                }
            }
        }
        Ok(Some(out))
    }

    pub fn eof(&self) -> StreamResult<bool> {
        self.ensure_open()?;
        if !self.readback.lock().is_empty() {
            return Ok(false);
        }
        self.backend.eof()
    }

    /// Next byte, or `None` at end of input
    pub fn getbyte(&self) -> StreamResult<Option<u8>> {
        match self.read_blocking(1) {
            Ok(byte) => Ok(byte.first().copied()),
            Err(StreamError::EndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Next byte; fails with `EndOfStream` at end of input
    pub fn readbyte(&self) -> StreamResult<u8> {
        self.getbyte()?.ok_or(StreamError::EndOfStream)
    }

    pub fn ungetbyte(&self, byte: u8) {
        self.unread(&[byte]);
    }

    /// Next UTF-8 character, or `None` at end of input.
    ///
    /// Malformed or truncated sequences decode to U+FFFD; a byte that cannot
    /// continue the current sequence is left for the next read.
    pub fn getc(&self) -> StreamResult<Option<char>> {
        let lead = match self.getbyte()? {
            Some(lead) => lead,
            None => return Ok(None),
        };
        let width = utf8_width(lead);
        if width <= 1 {
            return Ok(Some(if width == 1 {
                lead as char
            } else {
                char::REPLACEMENT_CHARACTER
            }));
        }

        let mut buf = [lead, 0, 0, 0];
        let mut len = 1;
        while len < width {
            match self.getbyte()? {
                Some(byte) if byte & 0xC0 == 0x80 => {
                    buf[len] = byte;
                    len += 1;
                }
                Some(byte) => {
                    self.ungetbyte(byte);
                    break;
                }
                None => break,
            }
        }
        let decoded = std::str::from_utf8(&buf[..len])
            .ok()
            .and_then(|s| s.chars().next());
        Ok(Some(decoded.unwrap_or(char::REPLACEMENT_CHARACTER)))
    }

    /// Next UTF-8 character; fails with `EndOfStream` at end of input
    pub fn readchar(&self) -> StreamResult<char> {
        self.getc()?.ok_or(StreamError::EndOfStream)
    }

    pub fn ungetc(&self, c: char) {
        let mut buf = [0u8; 4];
        self.unread(c.encode_utf8(&mut buf).as_bytes());
    }

    /// Best-effort seek. Pushed-back bytes count as not yet read.
    pub fn seek(&self, pos: SeekFrom) -> StreamResult<u64> {
        let mut readback = self.readback.lock();
        let pending = readback.len() as u64;
        match pos {
            SeekFrom::Current(0) => Ok(self.backend.seek(pos)?.saturating_sub(pending)),
            SeekFrom::Current(offset) => {
                let target = self
                    .backend
                    .seek(SeekFrom::Current(offset - pending as i64))?;
                readback.clear();
                Ok(target)
            }
            _ => {
                let target = self.backend.seek(pos)?;
                readback.clear();
                Ok(target)
            }
        }
    }

    /// Bytes consumed through this stream so far
    pub fn tell(&self) -> StreamResult<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Seek to the start and reset the line counter
    pub fn rewind(&self) -> StreamResult<()> {
        self.seek(SeekFrom::Start(0))?;
        self.set_lineno(0);
        Ok(())
    }

    /// Delimited reads completed so far
    pub fn lineno(&self) -> u64 {
        self.lineno.load(Ordering::SeqCst)
    }

    pub fn set_lineno(&self, lineno: u64) {
        self.lineno.store(lineno, Ordering::SeqCst);
    }

    pub(crate) fn bump_lineno(&self) {
        self.lineno.fetch_add(1, Ordering::SeqCst);
    }

    pub fn close(&self) -> StreamResult<()> {
        self.backend.close()?;
        self.readback.lock().clear();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_closed()
    }
}

impl ByteStream<StreamQueue> {
    /// Stream over a fresh unbounded queue
    pub fn queue() -> Self {
        Self::new(StreamQueue::unbounded())
    }

    /// Stream over a queue built from `config`
    pub fn from_config(config: StreamConfig) -> StreamResult<Self> {
        let queue = StreamQueue::with_config(&config)?;
        Self::with_config(queue, config)
    }

    /// Another handle to the underlying queue, for producer threads
    pub fn producer(&self) -> StreamQueue {
        self.backend.clone()
    }

    pub fn append(&self, bytes: impl Into<Bytes>) -> StreamResult<()> {
        self.backend.append(bytes)
    }

    pub fn end_input(&self) -> StreamResult<()> {
        self.backend.end_input()
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[test]
    fn readback_is_served_first() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("world"));
        stream.unread(b"hello ");
        assert_eq!(stream.read_blocking(3).unwrap(), &b"hel"[..]);
        assert_eq!(stream.read_all().unwrap(), b"lo world");
    }

    #[test]
    fn tell_discounts_pushed_back_bytes() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("abcdef"));
        stream.read_blocking(4).unwrap();
        stream.ungetbyte(b'd');
        assert_eq!(stream.tell().unwrap(), 3);
        assert_eq!(stream.seek(SeekFrom::Current(1)).unwrap(), 4);
        assert_eq!(stream.getbyte().unwrap(), Some(b'e'));
    }

    #[test]
    fn getc_decodes_multibyte_and_replaces_garbage() {
        let mut data = "é€".as_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xE2, b'x']);
        let stream = ByteStream::new(MemoryBackend::from_bytes(data));

        assert_eq!(stream.getc().unwrap(), Some('é'));
        assert_eq!(stream.getc().unwrap(), Some('€'));
        assert_eq!(stream.getc().unwrap(), Some(char::REPLACEMENT_CHARACTER));
        assert_eq!(stream.getc().unwrap(), Some(char::REPLACEMENT_CHARACTER));
        assert_eq!(stream.getc().unwrap(), Some('x'));
        assert_eq!(stream.getc().unwrap(), None);
        assert_eq!(stream.readchar(), Err(StreamError::EndOfStream));
    }

    #[test]
    fn ungetc_round_trips_a_character() {
        let stream = ByteStream::new(MemoryBackend::new());
        stream.ungetc('ß');
        assert!(!stream.eof().unwrap());
        assert_eq!(stream.readchar().unwrap(), 'ß');
    }

    #[test]
    fn zero_length_read_sees_pushed_back_bytes() {
        let stream = ByteStream::new(MemoryBackend::new());
        stream.ungetbyte(b'q');
        assert!(!stream.eof().unwrap());
        assert!(stream.read_nonblock(0).unwrap().is_empty());
        assert_eq!(stream.getbyte().unwrap(), Some(b'q'));
        assert_eq!(stream.read_nonblock(0), Err(StreamError::EndOfStream));
    }

    #[test]
    fn closed_stream_drops_pushed_back_bytes() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("abc"));
        stream.ungetbyte(b'z');
        stream.backend().close().unwrap();

        // Closing the backend directly still hides the read-back buffer.
        assert_eq!(stream.eof(), Err(StreamError::StreamClosed));
        assert_eq!(stream.read_nonblock(1), Err(StreamError::StreamClosed));
        stream.restore(b"xyz", &StreamError::Timeout);
        assert_eq!(stream.read_blocking(8), Err(StreamError::StreamClosed));
    }

    #[test]
    fn rewind_resets_lineno() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("a\nb\n"));
        stream.gets().unwrap();
        assert_eq!(stream.lineno(), 1);
        stream.rewind().unwrap();
        assert_eq!(stream.lineno(), 0);
        assert_eq!(stream.gets().unwrap(), Some(b"a\n".to_vec()));
    }
}
