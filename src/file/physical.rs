//! Physical file backend for memory-mapped I/O.
//!
//! [`Physical`] maps a module image from disk into the process's address space with `memmap2`
//! and serves it through the [`crate::file::Backend`] trait. The mapping lives only as long as
//! the decoded module needs the raw bytes: the reader copies everything it keeps, so the file
//! can be overwritten once decoding has finished.

use super::Backend;
use crate::{
    Error::{Empty, FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A memory-mapped module image.
#[derive(Debug)]
pub struct Physical {
    /// The mapped file contents
    data: Mmap,
}

impl Physical {
    /// Opens and maps `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Empty`] for zero-length files (which cannot be mapped portably).
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        if file.metadata().map_err(FileError)?.len() == 0 {
            return Err(Empty);
        }

        // The mapping is read-only and dropped before the store ever writes the path back.
        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(FileError(error)),
        };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
