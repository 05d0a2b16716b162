use std::fmt;

use bytes::{Buf, BytesMut};

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidUtf8,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChunksError(err) => write!(f, "failed to read response: {err}"),
            Error::InvalidUtf8 => f.write_str("response stream is not valid UTF-8"),
        }
    }
}

/// Splits a chunk stream into newline-delimited records.
///
/// Bytes are buffered until a `\n` arrives, so records split across chunks
/// (or multi-byte characters split across chunks) come out whole. Blank
/// lines are skipped. A trailing record without a newline is returned when
/// the stream ends.
pub struct Lines {
    buf: BytesMut,
    chunks: Chunks,
    exhausted: bool,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Some(line));
            }

            if self.exhausted {
                // Flush whatever is left without a terminating newline.
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let rest = self.buf.split();
                let line = decode(&rest)?;
                if line.trim().is_empty() {
                    return Ok(None);
                }
                return Ok(Some(line));
            }

            match self.chunks.next_chunk().await.map_err(Error::ChunksError)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, Error> {
        while let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(eol_idx);
            self.buf.advance(1);
            let line = decode(&line)?;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

#[inline]
fn decode(bytes: &[u8]) -> Result<String, Error> {
    let s = str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
    Ok(s.trim_end_matches('\r').to_owned())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_lines() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"{\"a\":1}\n"),
                Bytes::from_static(b"{\"b\":2}\n"),
            ]
            .into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"a\":1}");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "{\"b\":2}");
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_records() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"{\"text\":\"caf"),
                // "é" split between two chunks.
                Bytes::from_static(b"\xc3"),
                Bytes::from_static(b"\xa9\"}\r\n\n{\"done\""),
                Bytes::from_static(b":true}"),
            ]
            .into(),
        );
        let mut lines = Lines::new(chunks);
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"text\":\"café\"}"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "{\"done\":true}"
        );
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"\xff\xfe\n")].into(),
        );
        let mut lines = Lines::new(chunks);
        let err = lines.next_line().await.unwrap_err();
        assert_eq!(err, Error::InvalidUtf8);
        assert_eq!(err.to_string(), "response stream is not valid UTF-8");
        assert_eq!(
            Error::ChunksError(ChunksError("connection reset".to_owned()))
                .to_string(),
            "failed to read response: connection reset"
        );

        let chunks =
            Chunks::from_vec_deque(vec![Bytes::from_static(b"\n\n  \n")].into());
        let mut lines = Lines::new(chunks);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
