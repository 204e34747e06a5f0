//! In-memory message body.
//!
//! A [`Stream`] is a byte buffer with a cursor and a fixed capability set:
//! readable, writable, seekable. Any operation outside those capabilities
//! fails with a `StreamState` error instead of silently doing nothing.
//!
//! Streams are plain owned values. Two requests never share one; cloning a
//! message clones its body, cursor included.

use std::io::SeekFrom;

use bytes::Bytes;

use crate::error::Error;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stream {
    buf: Vec<u8>,
    pos: usize,
    readable: bool,
    writable: bool,
    seekable: bool,
}

impl Stream {
    /// An empty read/write/seek stream, the default body of every message.
    pub fn empty() -> Self {
        Self::writable(Vec::new())
    }

    /// A fully capable stream positioned at the start of `content`.
    pub fn writable(content: impl Into<Vec<u8>>) -> Self {
        Self::with_capabilities(content, true, true, true)
    }

    /// A readable, seekable, non-writable stream over `content`.
    pub fn read_only(content: impl Into<Vec<u8>>) -> Self {
        Self::with_capabilities(content, true, false, true)
    }

    pub fn from_bytes(content: Bytes) -> Self {
        Self::read_only(content.to_vec())
    }

    pub fn with_capabilities(
        content: impl Into<Vec<u8>>,
        readable: bool,
        writable: bool,
        seekable: bool,
    ) -> Self {
        Self { buf: content.into(), pos: 0, readable, writable, seekable }
    }

    pub fn is_readable(&self) -> bool { self.readable }
    pub fn is_writable(&self) -> bool { self.writable }
    pub fn is_seekable(&self) -> bool { self.seekable }

    pub fn size(&self) -> usize { self.buf.len() }
    pub fn tell(&self) -> usize { self.pos }
    pub fn eof(&self) -> bool { self.pos >= self.buf.len() }

    /// Reads up to `len` bytes from the cursor.
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        if !self.readable {
            return Err(Error::stream_state("Cannot read from non-readable stream"));
        }
        if self.pos >= self.buf.len() {
            return Ok(Vec::new());
        }
        let end = self.pos.saturating_add(len).min(self.buf.len());
        let chunk = self.buf[self.pos..end].to_vec();
        self.pos = end;
        Ok(chunk)
    }

    /// Writes `data` at the cursor, overwriting and then extending the buffer.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if !self.writable {
            return Err(Error::stream_state("Cannot write to a non-writable stream"));
        }
        let end = self
            .pos
            .checked_add(data.len())
            .ok_or_else(|| Error::stream_state("Unable to write past the maximum stream size"))?;
        let overlap = self.buf.len().saturating_sub(self.pos).min(data.len());
        self.buf[self.pos..self.pos + overlap].copy_from_slice(&data[..overlap]);
        self.buf.extend_from_slice(&data[overlap..]);
        self.pos = end;
        Ok(data.len())
    }

    /// Moves the cursor. Targets before the start or past the end fail
    /// with `StreamState` and leave the cursor where it was.
    pub fn seek(&mut self, to: SeekFrom) -> Result<usize, Error> {
        if !self.seekable {
            return Err(Error::stream_state("Stream is not seekable"));
        }
        let target = match to {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::End(n) => self.buf.len() as i128 + i128::from(n),
            SeekFrom::Current(n) => self.pos as i128 + i128::from(n),
        };
        let target = usize::try_from(target)
            .ok()
            .filter(|t| *t <= self.buf.len())
            .ok_or_else(|| Error::stream_state(format!("Unable to seek to stream position {target}")))?;
        self.pos = target;
        Ok(target)
    }

    pub fn rewind(&mut self) -> Result<(), Error> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Everything from the cursor to the end. Moves the cursor to the end.
    pub fn contents(&mut self) -> Result<Vec<u8>, Error> {
        self.read(usize::MAX)
    }

    /// The whole buffer regardless of cursor or capabilities. Used when the
    /// body is handed to the transport.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    /// The whole buffer as UTF-8, lossy.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn write_then_read_back() {
        let mut s = Stream::empty();
        s.write(b"hello world").unwrap();
        assert!(s.eof());
        s.rewind().unwrap();
        assert_eq!(s.read(5).unwrap(), b"hello");
        assert_eq!(s.contents().unwrap(), b" world");
    }

    #[test]
    fn write_overwrites_at_cursor() {
        let mut s = Stream::writable("abcdef");
        s.seek(SeekFrom::Start(2)).unwrap();
        s.write(b"XYZWVU").unwrap();
        assert_eq!(s.to_string_lossy(), "abXYZWVU");
    }

    #[test]
    fn capabilities_are_enforced() {
        let mut ro = Stream::read_only("x");
        assert_eq!(ro.write(b"y").unwrap_err().kind(), ErrorKind::StreamState);

        let mut unseekable = Stream::with_capabilities("x", true, true, false);
        assert_eq!(unseekable.rewind().unwrap_err().kind(), ErrorKind::StreamState);

        let mut wo = Stream::with_capabilities("x", false, true, true);
        assert_eq!(wo.read(1).unwrap_err().kind(), ErrorKind::StreamState);
    }

    #[test]
    fn negative_seek_fails() {
        let mut s = Stream::writable("abc");
        assert!(s.seek(SeekFrom::Current(-1)).is_err());
        assert_eq!(s.seek(SeekFrom::End(-1)).unwrap(), 2);
    }

    #[test]
    fn seek_past_end_fails_and_keeps_cursor() {
        let mut s = Stream::writable("abc");
        s.seek(SeekFrom::Start(1)).unwrap();
        for to in [SeekFrom::Start(u64::MAX), SeekFrom::Start(4), SeekFrom::End(1), SeekFrom::Current(i64::MAX)] {
            assert_eq!(s.seek(to).unwrap_err().kind(), ErrorKind::StreamState);
            assert_eq!(s.tell(), 1);
        }
        s.write(b"x").unwrap();
        assert_eq!(s.to_string_lossy(), "axc");
        assert_eq!(s.seek(SeekFrom::End(0)).unwrap(), 3);
    }

    #[test]
    fn read_at_end_is_empty_and_keeps_cursor() {
        let mut s = Stream::writable("abc");
        s.seek(SeekFrom::End(0)).unwrap();
        assert!(s.read(1).unwrap().is_empty());
        assert_eq!(s.tell(), 3);
        assert!(s.contents().unwrap().is_empty());
        assert_eq!(s.tell(), 3);
    }
}
