//! Buffered line reader over an async byte stream
//!
//! Accumulates bytes, yields complete lines, and retains any partial
//! trailing fragment across reads. The "wait for more data" point is a
//! plain `read().await`, so a `LineReader` inside a `select!` keeps its
//! partial state when another branch wins.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// Explicit line-splitting state machine over any `AsyncRead`
pub struct LineReader<R> {
    inner: R,
    /// Bytes received but not yet returned as a line
    buf: Vec<u8>,
    /// Offset up to which `buf` has already been scanned for a separator
    scanned: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a byte stream
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            scanned: 0,
            eof: false,
        }
    }

    /// Next complete line, without its separator. `\r\n` is treated the
    /// same as `\n`. At end of stream a non-empty trailing fragment is
    /// returned as a final line; after that `None`.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + pos;
                let mut line: Vec<u8> = self.buf.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.scanned = 0;
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            self.scanned = self.buf.len();

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                self.scanned = 0;
                return Ok(Some(line));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_splits_lines() {
        let mut reader = LineReader::new(&b"one\ntwo\nthree\n"[..]);
        assert_eq!(reader.next_line().await.unwrap(), Some("one".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("two".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("three".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_trailing_fragment_returned_at_eof() {
        let mut reader = LineReader::new(&b"complete\npartial"[..]);
        assert_eq!(
            reader.next_line().await.unwrap(),
            Some("complete".to_string())
        );
        assert_eq!(
            reader.next_line().await.unwrap(),
            Some("partial".to_string())
        );
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_crlf_stripped() {
        let mut reader = LineReader::new(&b"a\r\nb\r\n"[..]);
        assert_eq!(reader.next_line().await.unwrap(), Some("a".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_fragment_retained_across_reads() {
        // Line split across two reads must come out whole
        let stream = tokio_test::io::Builder::new()
            .read(b"hel")
            .read(b"lo\nwor")
            .read(b"ld\n")
            .build();
        let mut reader = LineReader::new(stream);
        assert_eq!(reader.next_line().await.unwrap(), Some("hello".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("world".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_lines_preserved() {
        let mut reader = LineReader::new(&b"a\n\nb\n"[..]);
        assert_eq!(reader.next_line().await.unwrap(), Some("a".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("".to_string()));
        assert_eq!(reader.next_line().await.unwrap(), Some("b".to_string()));
    }
}
