use super::byte_source::ByteSource;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Wraps an `Arc<dyn ByteSource>` into a stateful `Read + Seek` stream.
///
/// The cursor can be restricted to a window of the source, which is how a
/// single zip entry's data is exposed without copying it out first.
pub struct ByteSourceCursor {
    inner: Arc<dyn ByteSource>,
    start: u64,
    len: u64,
    position: u64,
}

impl ByteSourceCursor {
    /// A cursor over the whole source. Used to hand the source to `zip::ZipArchive`.
    pub fn new(inner: Arc<dyn ByteSource>) -> Self {
        let len = inner.len();
        Self::window(inner, 0, len)
    }

    /// A cursor over `len` bytes starting at `start`. Positions are relative
    /// to `start`.
    pub fn window(inner: Arc<dyn ByteSource>, start: u64, len: u64) -> Self {
        let len = len.min(inner.len().saturating_sub(start));
        Self {
            inner,
            start,
            len,
            position: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for ByteSourceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.len || buf.is_empty() {
            return Ok(0);
        }
        let n = (self.len - self.position).min(buf.len() as u64) as usize;
        self.inner
            .read_exact_at(self.start + self.position, &mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for ByteSourceCursor {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(p) => self.len.checked_add_signed(p),
            SeekFrom::Current(p) => self.position.checked_add_signed(p),
        };
        let target = target
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start"))?;
        self.position = target;
        Ok(target)
    }
}
