use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use flate2::read::DeflateDecoder;
use zip::ZipArchive;

use super::Archive;
use crate::error::{Error, Result};
use crate::io::{ByteRange, ByteSource, ByteSourceCursor, ByteStream, FileSource, MemorySource};

/// A zip container read through random access.
///
/// The central directory is scanned once; entry data is then served
/// straight from the byte source, so stored entries support true
/// byte-range reads.
pub struct ZipContainer {
    source: Arc<dyn ByteSource>,
    index: HashMap<String, ZipEntryLoc>,
    names: Vec<String>,
}

#[derive(Clone, Copy)]
struct ZipEntryLoc {
    data_offset: u64,
    compressed_size: u64,
    size: u64,
    compression: EntryCompression,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryCompression {
    Stored,
    Deflated,
    Unsupported,
}

impl ZipContainer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_source(Arc::new(FileSource::open(path)?))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_source(Arc::new(MemorySource::new(bytes)))
    }

    /// Scan the central directory of `source` and cache entry locations.
    pub fn from_source(source: Arc<dyn ByteSource>) -> Result<Self> {
        let cursor = ByteSourceCursor::new(source.clone());
        let mut archive = ZipArchive::new(cursor)?;

        let mut index = HashMap::with_capacity(archive.len());
        let mut names = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            index.insert(
                name.clone(),
                ZipEntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    size: file.size(),
                    compression: match file.compression() {
                        zip::CompressionMethod::Stored => EntryCompression::Stored,
                        zip::CompressionMethod::Deflated => EntryCompression::Deflated,
                        _ => EntryCompression::Unsupported,
                    },
                },
            );
            names.push(name);
        }

        tracing::debug!(entries = names.len(), "indexed zip container");
        Ok(Self {
            source,
            index,
            names,
        })
    }

    fn locate(&self, name: &str) -> Result<ZipEntryLoc> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn raw_data(&self, loc: ZipEntryLoc) -> ByteSourceCursor {
        ByteSourceCursor::window(self.source.clone(), loc.data_offset, loc.compressed_size)
    }
}

impl Archive for ZipContainer {
    fn entries(&self) -> Vec<String> {
        self.names.clone()
    }

    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn open(&self, name: &str) -> Result<ByteStream> {
        let loc = self.locate(name)?;
        let data = self.raw_data(loc);

        match loc.compression {
            EntryCompression::Stored => Ok(ByteStream::new(data, loc.size)),
            EntryCompression::Deflated => Ok(ByteStream::new(
                DeflateDecoder::new(BufReader::new(data)),
                loc.size,
            )),
            EntryCompression::Unsupported => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("unsupported compression method for {name}"),
            ))),
        }
    }

    fn open_range(&self, name: &str, range: ByteRange) -> Result<ByteStream> {
        let loc = self.locate(name)?;
        if loc.compression != EntryCompression::Stored {
            return Ok(self.open(name)?.slice(range)?);
        }

        let (offset, count) = range.resolve(loc.size)?;
        let window =
            ByteSourceCursor::window(self.source.clone(), loc.data_offset + offset, count);
        Ok(ByteStream::new(window, count))
    }
}
