//! Type references, signatures and their ECMA-335 blob encoding.
//!
//! Everything a module refers to is described by value: a [`TypeRef`] names a type together with
//! the module scope that declares it, [`TypeSig`] describes the shape of a value (primitive, class,
//! value type, by-reference or single-dimensional array), and [`MethodRef`] / [`FieldRef`] name a
//! member on a declaring type. On disk, class and value-type references point into the module's
//! type reference table; [`TypeRefTable`] interns them while encoding and resolves them while
//! decoding.
//!
//! # Binary Format
//!
//! Signatures use the element type codes of ECMA-335 II.23.1.16:
//! - Primitives are a single element type byte
//! - `CLASS` / `VALUETYPE` are followed by a compressed 1-based type reference row
//! - `BYREF` / `SZARRAY` are followed by the element type
//! - Method signatures start with the calling convention (`0x20` when the method has `this`),
//!   followed by the compressed parameter count, the return type and the parameter types
//! - Field signatures start with `0x06` followed by the field type
//!
//! # Examples
//!
//! ```rust
//! use crosspatch::metadata::signatures::{
//!     encode_method_signature, MethodSig, SignatureDecoder, TypeRef, TypeRefTable, TypeSig,
//! };
//! use crosspatch::Parser;
//!
//! let player = TypeRef::new("Game", "Game.Units", "Player");
//! let signature = MethodSig::new_static(TypeSig::Boolean, vec![TypeSig::Class(player)]);
//!
//! let mut table = TypeRefTable::default();
//! let mut blob = Vec::new();
//! encode_method_signature(&signature, &mut blob, &mut table)?;
//!
//! let mut parser = Parser::new(&blob);
//! let decoded = SignatureDecoder::new(&mut parser, &table).method_signature()?;
//! assert_eq!(decoded, signature);
//! # Ok::<(), crosspatch::Error>(())
//! ```

use std::{collections::HashMap, fmt};

use crate::{
    file::{
        io::{write_compressed_len, write_compressed_uint},
        parser::Parser,
    },
    Error::RecursionLimit,
    Result,
};

/// Maximum nesting of by-reference and array signatures accepted while decoding
pub(crate) const MAX_RECURSION_DEPTH: usize = 50;

/// Calling convention flag for instance methods
pub const CALLCONV_HASTHIS: u8 = 0x20;
/// Calling convention of field signatures
pub const CALLCONV_FIELD: u8 = 0x06;

#[allow(non_snake_case, dead_code, missing_docs)]
/// Bytes that represent the element types of a signature
pub mod ELEMENT_TYPE {
    //Marks end of a list
    pub const END: u8 = 0x00;
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    // Followed by type
    pub const BYREF: u8 = 0x10;
    // Followed by TypeDef or TypeRef token
    pub const VALUETYPE: u8 = 0x11;
    // Followed by TypeDef or TypeRef token
    pub const CLASS: u8 = 0x12;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const OBJECT: u8 = 0x1c;
    // Single-dim array with 0 lower bound
    pub const SZARRAY: u8 = 0x1d;
}

/// A reference to a type, qualified by the module scope that declares it.
///
/// The scope is the simple name of the declaring module; the module file is located by
/// appending the configured extension to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    /// Simple name of the module declaring the type
    pub scope: String,
    /// Namespace of the type, empty for the global namespace
    pub namespace: String,
    /// Simple name of the type
    pub name: String,
}

impl TypeRef {
    /// Creates a new type reference.
    pub fn new(
        scope: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeRef {
            scope: scope.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns `Namespace.Name`, or just the name for the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.scope, self.full_name())
    }
}

/// The shape of a value as it appears in signatures and instruction operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TypeSig {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Object,
    /// Native signed integer
    I,
    /// Native unsigned integer
    U,
    /// A reference type declared in some module
    Class(TypeRef),
    /// A value type declared in some module
    ValueType(TypeRef),
    /// A managed pointer to the inner type
    ByRef(Box<TypeSig>),
    /// A single-dimensional, zero-based array of the inner type
    SzArray(Box<TypeSig>),
}

impl TypeSig {
    /// Returns `true` for the `void` return type.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSig::Void)
    }

    /// Returns `true` for managed pointers.
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        matches!(self, TypeSig::ByRef(_))
    }

    /// Returns the pointee of a by-reference type.
    #[must_use]
    pub fn by_ref_target(&self) -> Option<&TypeSig> {
        match self {
            TypeSig::ByRef(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns the declared type of class and value-type signatures.
    #[must_use]
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            TypeSig::Class(type_ref) | TypeSig::ValueType(type_ref) => Some(type_ref),
            _ => None,
        }
    }

    /// Wraps `self` into a managed pointer.
    #[must_use]
    pub fn into_by_ref(self) -> TypeSig {
        TypeSig::ByRef(Box::new(self))
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Void => write!(f, "void"),
            TypeSig::Boolean => write!(f, "bool"),
            TypeSig::Char => write!(f, "char"),
            TypeSig::I1 => write!(f, "int8"),
            TypeSig::U1 => write!(f, "uint8"),
            TypeSig::I2 => write!(f, "int16"),
            TypeSig::U2 => write!(f, "uint16"),
            TypeSig::I4 => write!(f, "int32"),
            TypeSig::U4 => write!(f, "uint32"),
            TypeSig::I8 => write!(f, "int64"),
            TypeSig::U8 => write!(f, "uint64"),
            TypeSig::R4 => write!(f, "float32"),
            TypeSig::R8 => write!(f, "float64"),
            TypeSig::String => write!(f, "string"),
            TypeSig::Object => write!(f, "object"),
            TypeSig::I => write!(f, "native int"),
            TypeSig::U => write!(f, "native uint"),
            TypeSig::Class(type_ref) => write!(f, "class {type_ref}"),
            TypeSig::ValueType(type_ref) => write!(f, "valuetype {type_ref}"),
            TypeSig::ByRef(inner) => write!(f, "{inner}&"),
            TypeSig::SzArray(inner) => write!(f, "{inner}[]"),
        }
    }
}

/// Signature of a method: receiver, return type and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// `true` if the method receives `this` as argument 0
    pub has_this: bool,
    /// The return type, [`TypeSig::Void`] if nothing is returned
    pub return_type: TypeSig,
    /// Declared parameter types, not including `this`
    pub params: Vec<TypeSig>,
}

impl MethodSig {
    /// Signature of a static method.
    #[must_use]
    pub fn new_static(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: false,
            return_type,
            params,
        }
    }

    /// Signature of an instance method.
    #[must_use]
    pub fn new_instance(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSig {
            has_this: true,
            return_type,
            params,
        }
    }

    /// Number of argument slots, counting `this`.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.params.len() + usize::from(self.has_this)
    }
}

/// A reference to a method on a declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// The type declaring the method
    pub declaring_type: TypeRef,
    /// The method name
    pub name: String,
    /// The method signature
    pub signature: MethodSig,
}

impl MethodRef {
    /// Creates a new method reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, signature: MethodSig) -> Self {
        MethodRef {
            declaring_type,
            name: name.into(),
            signature,
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// A reference to a field on a declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// The type declaring the field
    pub declaring_type: TypeRef,
    /// The field name
    pub name: String,
    /// The declared field type
    pub field_type: TypeSig,
}

impl FieldRef {
    /// Creates a new field reference.
    pub fn new(declaring_type: TypeRef, name: impl Into<String>, field_type: TypeSig) -> Self {
        FieldRef {
            declaring_type,
            name: name.into(),
            field_type,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

/// The type reference table of a module image.
///
/// Rows are 1-based; interning the same reference twice yields the same row.
#[derive(Debug, Default, Clone)]
pub struct TypeRefTable {
    rows: Vec<TypeRef>,
    index: HashMap<TypeRef, u32>,
}

impl TypeRefTable {
    /// Returns the row of `type_ref`, appending it if it is not yet present.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the table outgrows a compressed integer.
    pub fn intern(&mut self, type_ref: &TypeRef) -> Result<u32> {
        if let Some(row) = self.index.get(type_ref) {
            return Ok(*row);
        }

        let row = u32::try_from(self.rows.len() + 1)
            .map_err(|_| malformed_error!("Type reference table is full"))?;
        self.rows.push(type_ref.clone());
        self.index.insert(type_ref.clone(), row);
        Ok(row)
    }

    /// Resolves a 0-based row index.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the row does not exist.
    pub fn get(&self, index: usize) -> Result<&TypeRef> {
        self.rows
            .get(index)
            .ok_or_else(|| malformed_error!("Type reference row {} does not exist", index + 1))
    }

    /// Reads a 1-based row reference from `parser` and resolves it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for row 0 or a row past the end of the table.
    pub fn read(&self, parser: &mut Parser) -> Result<TypeRef> {
        match parser.read_row()? {
            Some(index) => Ok(self.get(index)?.clone()),
            None => Err(malformed_error!(
                "Missing type reference at offset {}",
                parser.pos()
            )),
        }
    }

    /// Reads an optional 1-based row reference (0 = none) from `parser`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a row past the end of the table.
    pub fn read_optional(&self, parser: &mut Parser) -> Result<Option<TypeRef>> {
        match parser.read_row()? {
            Some(index) => Ok(Some(self.get(index)?.clone())),
            None => Ok(None),
        }
    }

    /// All rows in table order.
    #[must_use]
    pub fn rows(&self) -> &[TypeRef] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<TypeRef> for TypeRefTable {
    fn from_iter<I: IntoIterator<Item = TypeRef>>(iter: I) -> Self {
        let mut table = TypeRefTable::default();
        for type_ref in iter {
            let row = table.rows.len() + 1;
            table.index.entry(type_ref.clone()).or_insert(row as u32);
            table.rows.push(type_ref);
        }
        table
    }
}

/// Decodes signatures from a module image, resolving type references against the image's table.
pub struct SignatureDecoder<'p, 'a> {
    parser: &'p mut Parser<'a>,
    type_refs: &'p TypeRefTable,
    depth: usize,
}

impl<'p, 'a> SignatureDecoder<'p, 'a> {
    /// Creates a decoder reading from the current position of `parser`.
    pub fn new(parser: &'p mut Parser<'a>, type_refs: &'p TypeRefTable) -> Self {
        SignatureDecoder {
            parser,
            type_refs,
            depth: 0,
        }
    }

    /// Decodes a single type signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown element types or dangling type references
    /// and [`crate::Error::RecursionLimit`] for excessive nesting.
    pub fn type_signature(&mut self) -> Result<TypeSig> {
        self.depth += 1;
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(RecursionLimit(MAX_RECURSION_DEPTH));
        }

        let current_byte = self.parser.read_le::<u8>()?;
        let signature = match current_byte {
            ELEMENT_TYPE::VOID => TypeSig::Void,
            ELEMENT_TYPE::BOOLEAN => TypeSig::Boolean,
            ELEMENT_TYPE::CHAR => TypeSig::Char,
            ELEMENT_TYPE::I1 => TypeSig::I1,
            ELEMENT_TYPE::U1 => TypeSig::U1,
            ELEMENT_TYPE::I2 => TypeSig::I2,
            ELEMENT_TYPE::U2 => TypeSig::U2,
            ELEMENT_TYPE::I4 => TypeSig::I4,
            ELEMENT_TYPE::U4 => TypeSig::U4,
            ELEMENT_TYPE::I8 => TypeSig::I8,
            ELEMENT_TYPE::U8 => TypeSig::U8,
            ELEMENT_TYPE::R4 => TypeSig::R4,
            ELEMENT_TYPE::R8 => TypeSig::R8,
            ELEMENT_TYPE::STRING => TypeSig::String,
            ELEMENT_TYPE::OBJECT => TypeSig::Object,
            ELEMENT_TYPE::I => TypeSig::I,
            ELEMENT_TYPE::U => TypeSig::U,
            ELEMENT_TYPE::CLASS => TypeSig::Class(self.type_refs.read(self.parser)?),
            ELEMENT_TYPE::VALUETYPE => TypeSig::ValueType(self.type_refs.read(self.parser)?),
            ELEMENT_TYPE::BYREF => TypeSig::ByRef(Box::new(self.type_signature()?)),
            ELEMENT_TYPE::SZARRAY => TypeSig::SzArray(Box::new(self.type_signature()?)),
            _ => {
                return Err(malformed_error!(
                    "Unsupported element type - 0x{:02x} at offset {}",
                    current_byte,
                    self.parser.pos() - 1
                ))
            }
        };

        self.depth -= 1;
        Ok(signature)
    }

    /// Decodes a method signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unsupported calling conventions or bad types.
    pub fn method_signature(&mut self) -> Result<MethodSig> {
        let convention = self.parser.read_le::<u8>()?;
        if convention & !CALLCONV_HASTHIS != 0 {
            return Err(malformed_error!(
                "Unsupported calling convention - 0x{:02x}",
                convention
            ));
        }

        let param_count = self.parser.read_count()?;
        let return_type = self.type_signature()?;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(self.type_signature()?);
        }

        Ok(MethodSig {
            has_this: convention & CALLCONV_HASTHIS != 0,
            return_type,
            params,
        })
    }

    /// Decodes a field signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the blob is not a field signature.
    pub fn field_signature(&mut self) -> Result<TypeSig> {
        let convention = self.parser.read_le::<u8>()?;
        if convention != CALLCONV_FIELD {
            return Err(malformed_error!(
                "Expected field signature, found 0x{:02x}",
                convention
            ));
        }
        self.type_signature()
    }
}

/// Encodes a type signature, interning class and value-type references into `type_refs`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a row does not fit a compressed integer.
pub fn encode_type_sig(
    signature: &TypeSig,
    buffer: &mut Vec<u8>,
    type_refs: &mut TypeRefTable,
) -> Result<()> {
    match signature {
        TypeSig::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSig::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSig::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSig::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSig::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSig::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSig::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSig::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSig::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSig::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSig::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSig::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSig::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSig::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSig::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSig::I => buffer.push(ELEMENT_TYPE::I),
        TypeSig::U => buffer.push(ELEMENT_TYPE::U),
        TypeSig::Class(type_ref) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            write_compressed_uint(buffer, type_refs.intern(type_ref)?)?;
        }
        TypeSig::ValueType(type_ref) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            write_compressed_uint(buffer, type_refs.intern(type_ref)?)?;
        }
        TypeSig::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type_sig(inner, buffer, type_refs)?;
        }
        TypeSig::SzArray(inner) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_type_sig(inner, buffer, type_refs)?;
        }
    }
    Ok(())
}

/// Encodes a method signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a count or row does not fit a compressed integer.
pub fn encode_method_signature(
    signature: &MethodSig,
    buffer: &mut Vec<u8>,
    type_refs: &mut TypeRefTable,
) -> Result<()> {
    buffer.push(if signature.has_this {
        CALLCONV_HASTHIS
    } else {
        0
    });
    write_compressed_len(buffer, signature.params.len())?;
    encode_type_sig(&signature.return_type, buffer, type_refs)?;
    for param in &signature.params {
        encode_type_sig(param, buffer, type_refs)?;
    }
    Ok(())
}

/// Encodes a field signature.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a row does not fit a compressed integer.
pub fn encode_field_signature(
    field_type: &TypeSig,
    buffer: &mut Vec<u8>,
    type_refs: &mut TypeRefTable,
) -> Result<()> {
    buffer.push(CALLCONV_FIELD);
    encode_type_sig(field_type, buffer, type_refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn player() -> TypeRef {
        TypeRef::new("Game", "Game.Units", "Player")
    }

    #[test]
    fn type_ref_names() {
        let global = TypeRef::new("Game", "", "Program");
        assert_eq!(global.full_name(), "Program");
        assert_eq!(player().full_name(), "Game.Units.Player");
        assert_eq!(player().to_string(), "[Game]Game.Units.Player");
    }

    #[test]
    fn type_sig_display() {
        let sig = TypeSig::SzArray(Box::new(TypeSig::Class(player()))).into_by_ref();
        assert_eq!(sig.to_string(), "class [Game]Game.Units.Player[]&");
        assert!(sig.is_by_ref());
        assert!(sig.by_ref_target().is_some());
    }

    #[test]
    fn table_interning() {
        let mut table = TypeRefTable::default();
        let first = table.intern(&player()).unwrap();
        let second = table.intern(&TypeRef::new("Game", "", "World")).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(table.intern(&player()).unwrap(), 1);
        assert_eq!(table.len(), 2);
        assert!(table.get(2).is_err());
    }

    #[test]
    fn encode_class_signature() {
        let mut table = TypeRefTable::default();
        let mut buffer = Vec::new();
        encode_type_sig(
            &TypeSig::ByRef(Box::new(TypeSig::Class(player()))),
            &mut buffer,
            &mut table,
        )
        .unwrap();
        assert_eq!(buffer, [ELEMENT_TYPE::BYREF, ELEMENT_TYPE::CLASS, 0x01]);
    }

    #[test]
    fn method_signature_roundtrip() {
        let signature = MethodSig::new_instance(
            TypeSig::ValueType(TypeRef::new("Engine", "Engine", "Vector3")),
            vec![TypeSig::I4, TypeSig::Boolean.into_by_ref(), TypeSig::String],
        );

        let mut table = TypeRefTable::default();
        let mut buffer = Vec::new();
        encode_method_signature(&signature, &mut buffer, &mut table).unwrap();
        assert_eq!(buffer[0], CALLCONV_HASTHIS);

        let mut parser = Parser::new(&buffer);
        let decoded = SignatureDecoder::new(&mut parser, &table)
            .method_signature()
            .unwrap();
        assert_eq!(decoded, signature);
        assert_eq!(decoded.arg_count(), 4);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn field_signature() {
        let mut table = TypeRefTable::default();
        let mut buffer = Vec::new();
        encode_field_signature(&TypeSig::Class(player()), &mut buffer, &mut table).unwrap();

        let mut parser = Parser::new(&buffer);
        let decoded = SignatureDecoder::new(&mut parser, &table)
            .field_signature()
            .unwrap();
        assert_eq!(decoded, TypeSig::Class(player()));

        let mut parser = Parser::new(&[0x20, 0x00, 0x01]);
        assert!(SignatureDecoder::new(&mut parser, &table)
            .field_signature()
            .is_err());
    }

    #[test]
    fn dangling_type_reference() {
        let table = TypeRefTable::default();
        let mut parser = Parser::new(&[ELEMENT_TYPE::CLASS, 0x01]);
        assert!(matches!(
            SignatureDecoder::new(&mut parser, &table).type_signature(),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn recursion_limit() {
        let data = vec![ELEMENT_TYPE::BYREF; 64];
        let table = TypeRefTable::default();
        let mut parser = Parser::new(&data);
        assert!(matches!(
            SignatureDecoder::new(&mut parser, &table).type_signature(),
            Err(Error::RecursionLimit(_))
        ));
    }

    #[test]
    fn unknown_element_type() {
        let table = TypeRefTable::default();
        let mut parser = Parser::new(&[0x13, 0x00]);
        assert!(SignatureDecoder::new(&mut parser, &table)
            .type_signature()
            .is_err());
    }
}
