//! Low-level byte stream parser for module image decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data parser
//! used to read module image tables, signature blobs and method bytecode. It offers bounds-checked
//! access to binary data and the variable-length encodings defined by ECMA-335.
//!
//! # Key Components
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] - Read primitive types (little-endian)
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a run of raw bytes
//! - [`crate::file::parser::Parser::read_count`] - Read an element count checked against the
//!   remaining data
//!
//! ## Encoded Value Methods
//! - [`crate::file::parser::Parser::read_compressed_uint`] - Read compressed unsigned integers
//! - [`crate::file::parser::Parser::read_row`] - Read a 1-based table row (0 = none)
//! - [`crate::file::parser::Parser::read_7bit_encoded_int`] - Read 7-bit encoded integers
//! - [`crate::file::parser::Parser::read_prefixed_string_utf8`] - Read length-prefixed UTF-8 strings
//!
//! # Usage Examples
//!
//! ```rust
//! use crosspatch::Parser;
//!
//! let data = [0x01, 0x02, 0x80, 0x80, 3, b'F', b'o', b'o'];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u16>()?, 0x0201);
//! assert_eq!(parser.read_compressed_uint()?, 128);
//! assert_eq!(parser.read_prefixed_string_utf8()?, "Foo");
//! assert!(!parser.has_more_data());
//! # Ok::<(), crosspatch::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Result,
};

/// A cursor over a byte slice with bounds-checked reads.
///
/// The parser maintains an internal position and never reads past the end of its data; every
/// failing read reports [`crate::Error::OutOfBounds`] or [`crate::Error::Malformed`].
///
/// # Examples
///
/// ```rust
/// use crosspatch::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_le::<u32>()?;
/// assert_eq!(first, 0x04030201);
///
/// let rest = parser.read_bytes(4)?;
/// assert_eq!(rest, [0x05, 0x06, 0x07, 0x08]);
/// assert!(parser.read_le::<u8>().is_err());
/// # Ok::<(), crosspatch::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// - Values 0-127: 1 byte (0xxxxxxx)
    /// - Values 128-16383: 2 bytes (10xxxxxx xxxxxxxx)
    /// - Values 16384-536870911: 4 bytes (110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid compressed uint format.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read a compressed unsigned integer used as a count.
    ///
    /// Every counted element occupies at least one byte, so the count may not exceed the
    /// remaining data.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the count exceeds the remaining bytes.
    pub fn read_count(&mut self) -> Result<usize> {
        let count = self.read_compressed_uint()? as usize;
        if count > self.remaining() {
            return Err(malformed_error!(
                "Count {} at offset {} exceeds the remaining {} bytes",
                count,
                self.position,
                self.remaining()
            ));
        }
        Ok(count)
    }

    /// Read a 1-based table row reference, returning the 0-based index or `None` for row 0.
    ///
    /// # Errors
    /// Returns the errors of [`Parser::read_compressed_uint`].
    pub fn read_row(&mut self) -> Result<Option<usize>> {
        let row = self.read_compressed_uint()? as usize;
        Ok(row.checked_sub(1))
    }

    /// Read a 7-bit encoded integer as used by length-prefixed strings.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] if the value overflows `u32`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use crosspatch::Parser;
    ///
    /// let data = [0x80, 0x01];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_7bit_encoded_int()?, 128);
    /// # Ok::<(), crosspatch::Error>(())
    /// ```
    pub fn read_7bit_encoded_int(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;

        loop {
            if self.position >= self.data.len() {
                return Err(out_of_bounds_error!());
            }

            let byte = self.data[self.position];
            self.position += 1;

            value |= u32::from(byte & 0x7F) << shift;
            shift += 7;

            if (byte & 0x80) == 0 {
                break;
            }

            if shift >= 32 {
                return Err(malformed_error!(
                    "7-bit encoded integer overflow: value exceeds u32 capacity after {} bits",
                    shift
                ));
            }
        }

        Ok(value)
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// The string length is encoded as a 7-bit encoded integer, followed by that many
    /// UTF-8 bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for invalid UTF-8 encoding.
    pub fn read_prefixed_string_utf8(&mut self) -> Result<String> {
        let length = self.read_7bit_encoded_int()? as usize;
        let start = self.position;
        let string_data = self.read_bytes(length)?;

        String::from_utf8(string_data.to_vec()).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                start,
                start + length,
                e.utf8_error()
            )
        })
    }

    /// Calculates an end position safely with overflow checking.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the calculation would overflow
    /// or if the resulting position exceeds the data length.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_sequence() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u32>().unwrap(), 0x0403_0201);
        assert_eq!(parser.remaining(), 1);
        assert!(matches!(parser.read_le::<u16>(), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn compressed_uint() {
        let data = [0x03, 0x80, 0x80, 0xBF, 0xFF, 0xC0, 0x00, 0x40, 0x00];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_compressed_uint().unwrap(), 0x03);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x80);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x3FFF);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x4000);
    }

    #[test]
    fn compressed_uint_invalid() {
        let mut parser = Parser::new(&[0xFF, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parser.read_compressed_uint(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn count_exceeding_data() {
        let mut parser = Parser::new(&[0x05, 0x01]);
        assert!(matches!(parser.read_count(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn rows_are_one_based() {
        let mut parser = Parser::new(&[0x00, 0x01, 0x05]);
        assert_eq!(parser.read_row().unwrap(), None);
        assert_eq!(parser.read_row().unwrap(), Some(0));
        assert_eq!(parser.read_row().unwrap(), Some(4));
    }

    #[test]
    fn seven_bit_overflow() {
        let mut parser = Parser::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]);
        assert!(matches!(
            parser.read_7bit_encoded_int(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn prefixed_strings() {
        let data = [5, b'H', b'e', b'l', b'l', b'o', 4, b'a'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_prefixed_string_utf8().unwrap(), "Hello");
        assert!(matches!(
            parser.read_prefixed_string_utf8(),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn invalid_utf8() {
        let mut parser = Parser::new(&[2, 0xC3, 0x28]);
        assert!(matches!(
            parser.read_prefixed_string_utf8(),
            Err(Error::Malformed { .. })
        ));
    }
}
