//! Primitive binary encoding shared by the module image reader and writer.
//!
//! The [`CilIO`] trait gives every primitive integer and floating-point type a fixed-size
//! little-endian representation. Reading goes through bounds-checked helpers
//! ([`read_le`], [`read_le_at`]); writing appends to a growable buffer ([`write_le`]) and
//! provides the variable-length encodings the image format relies on:
//!
//! - [`write_compressed_uint`] - ECMA-335 II.23.2 compressed unsigned integers (1, 2 or 4 bytes)
//! - [`write_7bit_encoded_int`] - 7-bit continuation encoding used for string lengths
//! - [`write_prefixed_string`] - 7-bit length-prefixed UTF-8 strings
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::file::io::{read_le, write_compressed_uint, write_le};
//!
//! let mut buffer = Vec::new();
//! write_le(&mut buffer, 0x1234_u16);
//! write_compressed_uint(&mut buffer, 0x80)?;
//! assert_eq!(buffer, [0x34, 0x12, 0x80, 0x80]);
//! assert_eq!(read_le::<u16>(&buffer)?, 0x1234);
//! # Ok::<(), crosspatch::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Largest value representable as an ECMA-335 compressed unsigned integer.
pub const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// Trait for implementing type-specific safe binary data reading and writing operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait CilIO: Sized {
    /// Associated type representing the byte array type for this numeric type
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T into a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cil_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cil_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at `offset`, advancing it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes; `offset` is left
/// unchanged in that case.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Appends `value` to `buffer` in little-endian byte order.
pub fn write_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Overwrites `data[offset..]` with `value` in little-endian byte order.
///
/// Used to patch placeholders (branch displacements, section lengths) after the fact.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[offset..end].copy_from_slice(bytes);
    Ok(())
}

/// Appends an ECMA-335 compressed unsigned integer.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn write_compressed_uint(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    match value {
        0..=0x7F => {
            #[allow(clippy::cast_possible_truncation)]
            buffer.push(value as u8);
        }
        0x80..=0x3FFF => {
            #[allow(clippy::cast_possible_truncation)]
            buffer.extend_from_slice(&[0x80 | (value >> 8) as u8, value as u8]);
        }
        0x4000..=MAX_COMPRESSED_UINT => {
            buffer.extend_from_slice(&(0xC000_0000 | value).to_be_bytes());
        }
        _ => {
            return Err(malformed_error!(
                "Value {} is too large for a compressed integer",
                value
            ))
        }
    }
    Ok(())
}

/// Appends a compressed unsigned integer holding a `usize` count or index.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` exceeds [`MAX_COMPRESSED_UINT`].
pub fn write_compressed_len(buffer: &mut Vec<u8>, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| malformed_error!("Count {} does not fit a compressed integer", value))?;
    write_compressed_uint(buffer, value)
}

/// Appends a 7-bit encoded integer (low groups first, high bit marks continuation).
pub fn write_7bit_encoded_int(buffer: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        #[allow(clippy::cast_possible_truncation)]
        buffer.push((value as u8) | 0x80);
        value >>= 7;
    }
    #[allow(clippy::cast_possible_truncation)]
    buffer.push(value as u8);
}

/// Appends a 7-bit length-prefixed UTF-8 string.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the string is longer than `u32::MAX` bytes.
pub fn write_prefixed_string(buffer: &mut Vec<u8>, value: &str) -> Result<()> {
    let length = u32::try_from(value.len())
        .map_err(|_| malformed_error!("String of {} bytes is too long", value.len()))?;
    write_7bit_encoded_int(buffer, length);
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}
