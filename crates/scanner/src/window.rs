use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The region could not be read. Carries no detail: callers treat it as "no evidence".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("byte window unavailable")]
pub struct Unavailable;

/// Read-only access to a bounded region of foreign memory, addressed by byte offset.
///
/// Implementations must never panic across this seam. The underlying memory may be mutated
/// concurrently by its owner, so two reads of the same range can disagree; a single `read`
/// call is the unit of consistency the scanner relies on.
pub trait ByteWindow {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `len` bytes starting at `offset`, clipped at the end of the window.
    fn read(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, Unavailable>;
}

impl ByteWindow for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, Unavailable> {
        if offset > <[u8]>::len(self) {
            return Err(Unavailable);
        }
        let end = offset.saturating_add(len).min(<[u8]>::len(self));
        Ok(Cow::Borrowed(&self[offset..end]))
    }
}

impl ByteWindow for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, Unavailable> {
        self.as_slice().read(offset, len)
    }
}

/// A window that never yields bytes, e.g. when the foreign process is gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableWindow;

impl ByteWindow for UnavailableWindow {
    fn len(&self) -> usize {
        0
    }

    fn read(&self, _offset: usize, _len: usize) -> Result<Cow<'_, [u8]>, Unavailable> {
        Err(Unavailable)
    }
}

/// Memory dump on disk, read region by region.
#[derive(Debug, Clone)]
pub struct FileWindow {
    path: PathBuf,
    len: usize,
}

impl FileWindow {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path)?;
        let len = usize::try_from(meta.len()).unwrap_or(usize::MAX);
        Ok(Self { path, len })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_region(&self, offset: usize, len: usize) -> std::io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl ByteWindow for FileWindow {
    fn len(&self) -> usize {
        self.len
    }

    fn read(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, Unavailable> {
        if offset > self.len {
            return Err(Unavailable);
        }
        let len = len.min(self.len - offset);
        match self.read_region(offset, len) {
            Ok(bytes) => Ok(Cow::Owned(bytes)),
            Err(err) => {
                log::debug!("Dump {} unreadable at {offset}: {err}", self.path.display());
                Err(Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_reads_are_clipped() {
        let bytes = vec![1u8, 2, 3, 4];
        assert_eq!(bytes.read(1, 2).expect("read").as_ref(), &[2, 3]);
        assert_eq!(bytes.read(2, 10).expect("read").as_ref(), &[3, 4]);
        assert!(bytes.read(4, 1).expect("read").is_empty());
        assert_eq!(bytes.read(5, 1), Err(Unavailable));
    }

    #[test]
    fn unavailable_window_never_reads() {
        let window = UnavailableWindow;
        assert!(window.is_empty());
        assert_eq!(window.read(0, 4), Err(Unavailable));
    }

    #[test]
    fn file_window_reads_regions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dump.bin");
        std::fs::write(&path, [0u8, 0, 3, 7, 12, 9, 21, 0, 0]).expect("write dump");

        let window = FileWindow::open(&path).expect("open");
        assert_eq!(window.len(), 9);
        assert_eq!(window.read(2, 5).expect("read").as_ref(), &[3, 7, 12, 9, 21]);
        assert_eq!(window.read(7, 10).expect("read").as_ref(), &[0, 0]);
        assert_eq!(window.read(10, 1), Err(Unavailable));

        std::fs::remove_file(&path).expect("remove");
        assert_eq!(window.read(0, 1), Err(Unavailable));
    }
}
