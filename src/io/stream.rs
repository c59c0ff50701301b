use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// An inclusive byte range, following the HTTP `Range` header convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub begin: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Everything from `begin` to the end of the resource.
    pub fn starting_at(begin: u64) -> Self {
        Self {
            begin,
            end: u64::MAX,
        }
    }

    /// Clamp the range against a resource of `length` bytes and return
    /// `(offset, count)`.
    pub fn resolve(&self, length: u64) -> io::Result<(u64, u64)> {
        if length == 0 || self.begin >= length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {self} outside resource of {length} bytes"),
            ));
        }
        let end = self.end.min(length - 1);
        if self.begin > end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("empty range {self}"),
            ));
        }
        Ok((self.begin, end - self.begin + 1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.end == u64::MAX {
            write!(f, "{}-", self.begin)
        } else {
            write!(f, "{}-{}", self.begin, self.end)
        }
    }
}

impl FromStr for ByteRange {
    type Err = String;

    /// Parses `B-E` or the open-ended `B-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (begin, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected BEGIN-END, got {s:?}"))?;
        let begin: u64 = begin
            .trim()
            .parse()
            .map_err(|_| format!("invalid range start {begin:?}"))?;
        let end = end.trim();
        if end.is_empty() {
            return Ok(ByteRange::starting_at(begin));
        }
        let end: u64 = end
            .parse()
            .map_err(|_| format!("invalid range end {end:?}"))?;
        if end < begin {
            return Err(format!("range end {end} precedes start {begin}"));
        }
        Ok(ByteRange::new(begin, end))
    }
}

/// A readable byte stream plus its declared length.
///
/// This is what the archive hands out and what transformers consume and
/// produce. Dropping it releases the underlying entry.
pub struct ByteStream {
    reader: Box<dyn Read + Send>,
    length: u64,
}

impl ByteStream {
    pub fn new(reader: impl Read + Send + 'static, length: u64) -> Self {
        Self {
            reader: Box::new(reader),
            length,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len() as u64;
        Self::new(io::Cursor::new(bytes), length)
    }

    /// Declared length in bytes.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }

    /// Drain the stream into memory.
    pub fn read_to_vec(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.length.min(1 << 24) as usize);
        self.reader.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Narrow the stream to `range`, discarding the bytes before it.
    pub fn slice(mut self, range: ByteRange) -> io::Result<ByteStream> {
        let (offset, count) = range.resolve(self.length)?;
        let skipped = io::copy(&mut (&mut self.reader).take(offset), &mut io::sink())?;
        if skipped != offset {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream shorter than declared length",
            ));
        }
        Ok(ByteStream::new(self.reader.take(count), count))
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}
