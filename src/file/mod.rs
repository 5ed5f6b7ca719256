//! File access backends and low-level binary I/O for module images.
//!
//! A module image is either mapped from disk (`Physical`, backed by `memmap2`) or
//! held in memory (`Memory`). Both are exposed through the [`Backend`] trait and wrapped
//! by [`File`], which is what the module reader consumes. Sequential decoding goes through
//! [`parser::Parser`]; primitive encoding helpers live in [`io`].
//!
//! # Example
//!
//! ```rust,no_run
//! use crosspatch::File;
//!
//! let file = File::from_file("Game.dll".as_ref())?;
//! println!("{} bytes", file.len());
//! # Ok::<(), crosspatch::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend for accessing raw image bytes, either from memory or a memory-mapped file.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the full data buffer.
    fn data(&self) -> &[u8];

    /// Returns the length of the data.
    fn len(&self) -> usize;
}

/// A loaded module image, backed by a file mapping or an owned buffer.
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Maps the file at `file` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened and [`crate::Error::Empty`]
    /// if it has no content.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Wraps an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
        })
    }

    /// Returns the length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the complete image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked slice of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}
