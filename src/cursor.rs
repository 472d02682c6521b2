//! Bounded positional I/O over a backing byte source.
//!
//! The [`ByteSource`] trait is the only seam between the archive engine and
//! the bytes it operates on. It exposes positioned reads and writes without
//! exposing the backing resource's lifetime, so the same session code drives
//! an in-memory buffer ([`MemorySource`]) or a file on disk ([`FileSource`]).
//!
//! All failures propagate; there is no retry logic at this layer. Reads past
//! the known extent fail with [`Error::OutOfBounds`] rather than returning
//! short data, which is what keeps truncated archives from hanging higher
//! layers.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

/// A bounded, seekable read/write view over a backing byte source.
///
/// Writes may extend the source. A write either completes in full or fails;
/// partially-written regions are never observable because the session holds
/// its exclusive mutation lock across the whole operation.
pub trait ByteSource: Send {
    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// Fails with [`Error::OutOfBounds`] if `offset + buf.len()` exceeds
    /// [`extent`](Self::extent).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes all of `data` starting at `offset`, extending the source if
    /// the write reaches past the current extent.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Returns the current size of the source in bytes.
    fn extent(&self) -> u64;

    /// Truncates or zero-extends the source to exactly `len` bytes.
    ///
    /// Used by the trailer rewrite to drop stale bytes left behind by a
    /// previous, longer trailer.
    fn set_extent(&mut self, len: u64) -> Result<()>;
}

/// Checks a positioned read against the known extent.
fn check_bounds(offset: u64, len: u64, extent: u64) -> Result<()> {
    if offset.checked_add(len).is_none_or(|end| end > extent) {
        return Err(Error::OutOfBounds {
            offset,
            len,
            extent,
        });
    }
    Ok(())
}

/// An in-memory byte source backed by a `Vec<u8>`.
///
/// # Example
///
/// ```rust
/// use ziplus::{ByteSource, MemorySource};
///
/// let mut source = MemorySource::empty();
/// source.write_at(0, b"hello").unwrap();
/// assert_eq!(source.extent(), 5);
///
/// let mut buf = [0u8; 5];
/// source.read_at(0, &mut buf).unwrap();
/// assert_eq!(&buf, b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    /// Creates a source over existing bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Creates an empty source.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Consumes the source and returns the underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the underlying bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemorySource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_bounds(offset, buf.len() as u64, self.extent())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or(Error::OutOfBounds {
                offset,
                len: data.len() as u64,
                extent: self.extent(),
            })? as usize;
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn extent(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn set_extent(&mut self, len: u64) -> Result<()> {
        self.bytes.resize(len as usize, 0);
        Ok(())
    }
}

/// A byte source backed by a [`File`].
///
/// The file handle is seeked per operation; callers serialize access through
/// the session's mutation lock, so the shared cursor position is safe.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    extent: u64,
}

impl FileSource {
    /// Wraps an open file, recording its current length as the extent.
    pub fn new(file: File) -> Result<Self> {
        let extent = file.metadata()?.len();
        Ok(Self { file, extent })
    }

    /// Opens the file at `path` for reading and writing.
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Self::new(file)
    }

    /// Consumes the source and returns the underlying file.
    pub fn into_file(self) -> File {
        self.file
    }
}

impl ByteSource for FileSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_bounds(offset, buf.len() as u64, self.extent)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        let end = offset + data.len() as u64;
        if end > self.extent {
            self.extent = end;
        }
        Ok(())
    }

    fn extent(&self) -> u64 {
        self.extent
    }

    fn set_extent(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.extent = len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut source = MemorySource::empty();
        source.write_at(0, b"abcdef").unwrap();

        let mut buf = [0u8; 3];
        source.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"cde");
    }

    #[test]
    fn test_memory_read_out_of_bounds() {
        let mut source = MemorySource::new(vec![0u8; 8]);
        let mut buf = [0u8; 4];
        let err = source.read_at(6, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                offset: 6,
                len: 4,
                extent: 8
            }
        ));
    }

    #[test]
    fn test_memory_write_extends() {
        let mut source = MemorySource::new(vec![1, 2, 3]);
        source.write_at(5, b"xy").unwrap();
        assert_eq!(source.extent(), 7);
        // Gap is zero-filled
        assert_eq!(source.as_bytes(), &[1, 2, 3, 0, 0, b'x', b'y']);
    }

    #[test]
    fn test_memory_set_extent_truncates() {
        let mut source = MemorySource::new(vec![9u8; 16]);
        source.set_extent(4).unwrap();
        assert_eq!(source.extent(), 4);
        let mut buf = [0u8; 1];
        assert!(source.read_at(4, &mut buf).is_err());
    }

    #[test]
    fn test_memory_read_at_offset_overflow() {
        let mut source = MemorySource::new(vec![0u8; 8]);
        let mut buf = [0u8; 1];
        assert!(source.read_at(u64::MAX, &mut buf).is_err());
    }

    #[test]
    fn test_file_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");

        let mut source = FileSource::open_path(&path).unwrap();
        assert_eq!(source.extent(), 0);

        source.write_at(0, b"positional").unwrap();
        assert_eq!(source.extent(), 10);

        let mut buf = [0u8; 4];
        source.read_at(2, &mut buf).unwrap();
        assert_eq!(&buf, b"siti");

        source.set_extent(3).unwrap();
        assert_eq!(source.extent(), 3);
        assert!(source.read_at(0, &mut buf).is_err());
    }
}
