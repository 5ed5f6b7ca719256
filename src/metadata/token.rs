use std::fmt;

/// Table identifier of member references (methods and fields of any module).
pub const TABLE_MEMBER_REF: u8 = 0x0A;
/// Table identifier of type specifications (signature blobs).
pub const TABLE_TYPE_SPEC: u8 = 0x1B;
/// Table identifier of the user string heap.
pub const TABLE_USER_STRING: u8 = 0x70;

/// A metadata token as embedded in method bytecode.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the 1-based row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a table identifier and a 1-based row.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `row` does not fit in 24 bits.
    pub fn from_parts(table: u8, row: u32) -> crate::Result<Self> {
        if row > 0x00FF_FFFF {
            return Err(malformed_error!(
                "Row {} of table 0x{:02x} does not fit a token",
                row,
                table
            ));
        }
        Ok(Token((u32::from(table) << 24) | row))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}
