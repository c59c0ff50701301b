use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use super::Archive;
use crate::error::{Error, Result};
use crate::io::{ByteRange, ByteSource, ByteSourceCursor, ByteStream, FileSource};

/// An unpacked publication on disk, addressed with archive-style paths.
pub struct DirectoryContainer {
    root: PathBuf,
}

impl DirectoryContainer {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotFound(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an entry name onto the filesystem. Names that would escape the
    /// root are rejected.
    fn entry_path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn source(&self, name: &str) -> Result<Arc<FileSource>> {
        let path = self
            .entry_path(name)
            .filter(|p| p.is_file())
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(Arc::new(FileSource::open(path)?))
    }
}

impl Archive for DirectoryContainer {
    fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                Some(parts.join("/"))
            })
            .collect();
        names.sort();
        names
    }

    fn contains(&self, name: &str) -> bool {
        self.entry_path(name).is_some_and(|p| p.is_file())
    }

    fn open(&self, name: &str) -> Result<ByteStream> {
        let source = self.source(name)?;
        let cursor = ByteSourceCursor::new(source);
        let len = cursor.len();
        Ok(ByteStream::new(cursor, len))
    }

    fn open_range(&self, name: &str, range: ByteRange) -> Result<ByteStream> {
        let source = self.source(name)?;
        let (offset, count) = range.resolve(source.len())?;
        Ok(ByteStream::new(
            ByteSourceCursor::window(source, offset, count),
            count,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("OEBPS/audio")).unwrap();
        fs::write(dir.path().join("OEBPS/ch 1.xhtml"), b"chapter").unwrap();
        fs::write(dir.path().join("OEBPS/audio/a.mp3"), b"0123456789").unwrap();
        dir
    }

    #[test]
    fn test_lists_entries_with_forward_slashes() {
        let dir = fixture();
        let container = DirectoryContainer::open(dir.path()).unwrap();
        assert_eq!(container.entries(), vec!["OEBPS/audio/a.mp3", "OEBPS/ch 1.xhtml"]);
    }

    #[test]
    fn test_reads_with_encoding_fallback() {
        let dir = fixture();
        let container = DirectoryContainer::open(dir.path()).unwrap();
        assert!(container.has_entry("OEBPS/ch%201.xhtml"));
        assert_eq!(container.read_entry("OEBPS/ch%201.xhtml").unwrap(), b"chapter");
    }

    #[test]
    fn test_range_read() {
        let dir = fixture();
        let container = DirectoryContainer::open(dir.path()).unwrap();
        let stream = container
            .open_entry_range("OEBPS/audio/a.mp3", ByteRange::new(2, 4))
            .unwrap();
        assert_eq!(stream.read_to_vec().unwrap(), b"234");
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = fixture();
        let container = DirectoryContainer::open(dir.path().join("OEBPS")).unwrap();
        assert!(!container.has_entry("../OEBPS/ch 1.xhtml"));
        assert!(matches!(container.open("../x"), Err(Error::NotFound(_))));
    }
}
