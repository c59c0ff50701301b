//! Archive accessors: zip containers and exploded directories.
//!
//! Declared hrefs and actual entry names do not always agree on
//! percent-encoding, so every lookup tries the declared path first and then
//! its alternate encoding before reporting the entry missing.

mod directory;
mod zip_container;

pub use directory::DirectoryContainer;
pub use zip_container::ZipContainer;

use crate::error::{Error, Result};
use crate::io::{ByteRange, ByteStream};
use crate::util::{percent_decode, percent_encode_path};

/// Read access to the entries of a publication container.
pub trait Archive: Send + Sync {
    /// Entry names, in container order.
    fn entries(&self) -> Vec<String>;

    /// Exact-name lookup, no encoding fallback.
    fn contains(&self, name: &str) -> bool;

    /// Open the entry with exactly this name. The stream's length is the
    /// uncompressed size.
    fn open(&self, name: &str) -> Result<ByteStream>;

    /// Open part of the entry with exactly this name.
    fn open_range(&self, name: &str, range: ByteRange) -> Result<ByteStream> {
        Ok(self.open(name)?.slice(range)?)
    }

    /// The actual entry name for `path`, trying its alternate encoding if
    /// the declared form is absent.
    fn resolve_entry(&self, path: &str) -> Option<String> {
        if self.contains(path) {
            return Some(path.to_string());
        }
        let alternate = alternate_entry_name(path)?;
        if self.contains(&alternate) {
            tracing::debug!(declared = path, actual = %alternate, "entry found under alternate encoding");
            return Some(alternate);
        }
        None
    }

    fn has_entry(&self, path: &str) -> bool {
        self.resolve_entry(path).is_some()
    }

    /// Open the whole entry for `path`.
    fn open_entry_stream(&self, path: &str) -> Result<ByteStream> {
        let name = self
            .resolve_entry(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        self.open(&name)
    }

    /// Open `range` of the entry for `path`.
    fn open_entry_range(&self, path: &str, range: ByteRange) -> Result<ByteStream> {
        let name = self
            .resolve_entry(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        self.open_range(&name, range)
    }

    /// Read the whole entry for `path` into memory.
    fn read_entry(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.open_entry_stream(path)?.read_to_vec()?)
    }
}

/// The other plausible spelling of an entry name: decoded if it looks
/// percent-encoded, encoded otherwise.
pub fn alternate_entry_name(path: &str) -> Option<String> {
    let alternate = if path.contains('%') {
        percent_decode(path)
    } else {
        percent_encode_path(path)
    };
    (alternate != path).then_some(alternate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_entry_name() {
        assert_eq!(
            alternate_entry_name("OEBPS/my%20file.xhtml").as_deref(),
            Some("OEBPS/my file.xhtml")
        );
        assert_eq!(
            alternate_entry_name("OEBPS/my file.xhtml").as_deref(),
            Some("OEBPS/my%20file.xhtml")
        );
        assert_eq!(alternate_entry_name("OEBPS/plain.xhtml"), None);
    }
}
