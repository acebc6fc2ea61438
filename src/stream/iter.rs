//! Single-pass iterators over a stream's bytes, characters and lines.
//!
//! Each iterator consumes the stream as it goes and ends at end of input.
//! After yielding an error it yields nothing further.

use super::core::ByteStream;
use crate::backend::StreamBackend;
use crate::error::StreamResult;

macro_rules! stream_iter {
    ($name:ident, $item:ty, $next:ident) => {
        pub struct $name<'a, B> {
            stream: &'a ByteStream<B>,
            done: bool,
        }

        impl<'a, B: StreamBackend> Iterator for $name<'a, B> {
            type Item = StreamResult<$item>;

            fn next(&mut self) -> Option<Self::Item> {
                if self.done {
                    return None;
                }
                match self.stream.$next() {
                    Ok(Some(item)) => Some(Ok(item)),
                    Ok(None) => {
                        self.done = true;
                        None
                    }
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
        }

        impl<'a, B: StreamBackend> std::iter::FusedIterator for $name<'a, B> {}
    };
}

stream_iter!(ByteIter, u8, getbyte);
stream_iter!(CharIter, char, getc);
stream_iter!(LineIter, Vec<u8>, gets);

impl<B: StreamBackend> ByteStream<B> {
    pub fn each_byte(&self) -> ByteIter<'_, B> {
        ByteIter {
            stream: self,
            done: false,
        }
    }

    pub fn each_char(&self) -> CharIter<'_, B> {
        CharIter {
            stream: self,
            done: false,
        }
    }

    /// Lines split on the configured separator, separator included
    pub fn each_line(&self) -> LineIter<'_, B> {
        LineIter {
            stream: self,
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StreamError;
    use crate::memory::MemoryBackend;
    use crate::stream::ByteStream;
    use std::time::Duration;

    #[test]
    fn iterators_consume_the_stream() {
        let stream = ByteStream::new(MemoryBackend::from_bytes("ab\nçd\n"));
        let first: Vec<u8> = stream.each_byte().take(3).collect::<Result<_, _>>().unwrap();
        assert_eq!(first, b"ab\n");

        let chars: String = stream.each_char().collect::<Result<_, _>>().unwrap();
        assert_eq!(chars, "çd\n");
        assert_eq!(stream.each_line().count(), 0);
    }

    #[test]
    fn iterator_stops_after_an_error() {
        let config = crate::StreamConfig::new().default_timeout(Duration::from_millis(10));
        let stream = ByteStream::from_config(config).unwrap();
        stream.append(&b"x"[..]).unwrap();

        let mut bytes = stream.each_byte();
        assert_eq!(bytes.next(), Some(Ok(b'x')));
        assert_eq!(bytes.next(), Some(Err(StreamError::Timeout)));
        assert_eq!(bytes.next(), None);
    }
}
