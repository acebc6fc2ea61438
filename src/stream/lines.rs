//! Delimited reads.
//!
//! Reads pull whole available chunks from the backend rather than single
//! bytes; anything read past the delimiter goes back into the read-back
//! buffer, so a line read never loses data that follows it.

use super::core::ByteStream;
use crate::backend::StreamBackend;
use crate::error::{StreamError, StreamResult};

impl<B: StreamBackend> ByteStream<B> {
    /// Read up to and including `sep`, or until `limit` bytes are collected.
    ///
    /// Returns `None` at end of input when no bytes were collected. A final
    /// line without a trailing separator is returned as is. Bytes beyond the
    /// limit stay in the stream for the next read.
    pub fn read_delimited(&self, sep: &[u8], limit: Option<usize>) -> StreamResult<Option<Vec<u8>>> {
        if sep.is_empty() {
            return Err(StreamError::invalid("separator must not be empty"));
        }
        if limit == Some(0) {
            return Ok(Some(Vec::new()));
        }

        let deadline = self.deadline();
        let mut line = Vec::new();
        loop {
            let want = match limit {
                Some(limit) => limit - line.len(),
                None => self.config().read_chunk_size,
            };
            let chunk = match self.read_before(want, deadline) {
                Ok(chunk) => chunk,
                Err(StreamError::EndOfStream) => break,
                Err(e) => {
                    self.restore(&line, &e);
                    return Err(e);
                }
            };

            // The separator may straddle the previous chunk boundary.
            let search_from = line.len().saturating_sub(sep.len() - 1);
            line.extend_from_slice(&chunk);
            if let Some(offset) = find(&line[search_from..], sep) {
                let end = search_from + offset + sep.len();
                self.unread(&line[end..]);
                line.truncate(end);
                break;
            }
            if limit.map_or(false, |limit| line.len() >= limit) {
                break;
            }
        }

        if line.is_empty() {
            return Ok(None);
        }
        self.bump_lineno();
        Ok(Some(line))
    }

    /// Next line using the configured separator, or `None` at end of input
    pub fn gets(&self) -> StreamResult<Option<Vec<u8>>> {
        let sep = self.config().line_separator.clone();
        self.read_delimited(&sep, None)
    }

    /// Next line, capped at `limit` bytes
    pub fn gets_limit(&self, limit: usize) -> StreamResult<Option<Vec<u8>>> {
        let sep = self.config().line_separator.clone();
        self.read_delimited(&sep, Some(limit))
    }

    /// Next line; fails with `EndOfStream` at end of input
    pub fn readline(&self) -> StreamResult<Vec<u8>> {
        self.gets()?.ok_or(StreamError::EndOfStream)
    }

    /// All remaining lines
    pub fn readlines(&self) -> StreamResult<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        while let Some(line) = self.gets()? {
            lines.push(line);
        }
        Ok(lines)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use crate::memory::MemoryBackend;
    use crate::stream::ByteStream;
    use crate::stream_configuration::StreamConfig;

    #[test]
    fn separator_split_across_chunks_is_found() {
        let stream = ByteStream::queue();
        stream.append(&b"one\r"[..]).unwrap();
        stream.append(&b"\ntwo"[..]).unwrap();
        stream.end_input().unwrap();

        assert_eq!(stream.read_delimited(b"\r\n", None).unwrap(), Some(b"one\r\n".to_vec()));
        assert_eq!(stream.read_delimited(b"\r\n", None).unwrap(), Some(b"two".to_vec()));
        assert_eq!(stream.read_delimited(b"\r\n", None).unwrap(), None);
        assert_eq!(stream.lineno(), 2);
    }

    #[test]
    fn bytes_past_the_limit_are_kept() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("abcdef\n"));
        assert_eq!(stream.gets_limit(4).unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(stream.gets().unwrap(), Some(b"ef\n".to_vec()));
    }

    #[test]
    fn zero_limit_reads_nothing() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("abc"));
        assert_eq!(stream.read_delimited(b"\n", Some(0)).unwrap(), Some(Vec::new()));
        assert_eq!(stream.lineno(), 0);
        assert_eq!(stream.read_all().unwrap(), b"abc");
    }

    #[test]
    fn custom_separator_from_config() {
        let config = StreamConfig::new().line_separator("|");
        let stream = ByteStream::with_config(MemoryBackend::from_bytes("a|b|"), config).unwrap();
        assert_eq!(stream.readlines().unwrap(), vec![b"a|".to_vec(), b"b|".to_vec()]);
        assert!(stream.readline().is_err());
    }
}
