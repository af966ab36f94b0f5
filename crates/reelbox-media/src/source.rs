//! Data sources for container bytes.
//!
//! A container can be opened from a file path or handed an in-memory
//! buffer. Both forms expose the same surface: a sequential `Read +
//! Seek` view used by the box-tree parse, and `read_exact_at` for
//! random-offset sample fetches. Only the file form holds an OS
//! resource; [`DataSource::close`] releases it exactly once and is a
//! no-op for buffers.

use crate::Result;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access source for container bytes.
#[derive(Debug)]
pub enum DataSource {
    /// File-backed source owning the OS handle.
    File(File),
    /// In-memory buffer, nothing to release.
    Memory(Cursor<Vec<u8>>),
}

impl DataSource {
    /// Open a file-backed source.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::File(File::open(path)?))
    }

    /// Wrap an in-memory buffer.
    pub fn from_buffer(buf: Vec<u8>) -> Self {
        Self::Memory(Cursor::new(buf))
    }

    /// Total size of the source in bytes.
    pub fn len(&self) -> Result<u64> {
        match self {
            Self::File(f) => Ok(f.metadata()?.len()),
            Self::Memory(c) => Ok(c.get_ref().len() as u64),
        }
    }

    /// Whether the source holds no bytes at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fill `buf` from the absolute byte `offset`.
    ///
    /// A read past the end of the source is an error, never a short
    /// read.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)?;
        Ok(())
    }

    /// Release the underlying resource.
    ///
    /// Consumes the source so the file handle is closed exactly once.
    /// In-memory buffers have nothing to release.
    pub fn close(self) -> Result<()> {
        match self {
            Self::File(f) => {
                drop(f);
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }
}

impl Read for DataSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.read(buf),
            Self::Memory(c) => c.read(buf),
        }
    }
}

impl Seek for DataSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            Self::Memory(c) => c.seek(pos),
        }
    }
}
